/// Names the evaluator and reader recognize by spelling.
pub mod sym {
    pub const QUOTE: &[u8] = b"quote";
    pub const FN: &[u8] = b"fn";
    pub const LET: &[u8] = b"let";
    pub const IF: &[u8] = b"if";
    pub const EXIT: &[u8] = b"exit";
}

/// The special forms, dispatched on the spelling of a form's head.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecialForm {
    Quote,
    Fn,
    Let,
    If,
    Exit,
}

impl SpecialForm {
    pub fn from_name(name: &[u8]) -> Option<SpecialForm> {
        match name {
            sym::QUOTE => Some(SpecialForm::Quote),
            sym::FN => Some(SpecialForm::Fn),
            sym::LET => Some(SpecialForm::Let),
            sym::IF => Some(SpecialForm::If),
            sym::EXIT => Some(SpecialForm::Exit),
            _ => None,
        }
    }
}

/// Decimal integer literal: one or more digits with an optional leading minus.
pub fn is_numeral(text: &[u8]) -> bool {
    let digits = text.strip_prefix(b"-").unwrap_or(text);
    !digits.is_empty() && digits.iter().all(u8::is_ascii_digit)
}
