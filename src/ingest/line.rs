/// Command word that asks the process to shut down
pub const TERMINATE: &str = "terminate";

/// One decoded client line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Value(i64),
    Terminate,
    Invalid,
}

/// A value line is exactly `digits` ASCII digits; leading zeros are kept as
/// part of the width but not the value.
pub fn parse_line(line: &str, digits: usize) -> Line {
    if line == TERMINATE {
        return Line::Terminate;
    }
    if line.len() != digits || !line.bytes().all(|b| b.is_ascii_digit()) {
        return Line::Invalid;
    }
    match line.parse::<i64>() {
        Ok(value) => Line::Value(value),
        Err(_) => Line::Invalid,
    }
}
