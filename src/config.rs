use crate::error::{Error, Result};

/// The text qualification policy.
///
/// When writing, this decides which cells get wrapped in the qualifier
/// character. When reading, `Always` and `AsNeeded` behave identically:
/// qualifiers are recognized opportunistically wherever they open a cell.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Quoting {
    /// When writing, every cell is qualified. When reading, qualifiers are
    /// recognized as needed.
    Always,
    /// When writing, a cell is qualified only when its content contains the
    /// separator, a qualifier character or a line break. When reading,
    /// qualifiers are recognized as needed.
    AsNeeded,
    /// Qualifiers are never written and never recognized. Content is
    /// emitted raw, and the null-marker is not recognized when reading.
    None,
}

impl Default for Quoting {
    fn default() -> Quoting {
        Quoting::Always
    }
}

impl Quoting {
    pub(crate) fn is_enabled(&self) -> bool {
        match *self {
            Quoting::None => false,
            _ => true,
        }
    }
}

/// The line ending written after each row.
///
/// This only affects writing. The reader treats `\r\n`, `\n` and `\r` as
/// equivalent row terminators regardless of configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NewLine {
    /// `\r\n`
    Windows,
    /// `\n`
    Unix,
    /// `\r`
    OldMac,
}

impl Default for NewLine {
    fn default() -> NewLine {
        NewLine::Windows
    }
}

impl NewLine {
    /// The literal terminator text for this mode.
    pub fn as_str(&self) -> &'static str {
        match *self {
            NewLine::Windows => "\r\n",
            NewLine::Unix => "\n",
            NewLine::OldMac => "\r",
        }
    }
}

/// Checks the structural invariants shared by reader and writer settings.
///
/// The qualifier only participates when qualification is enabled: with
/// `Quoting::None`, a qualifier equal to the separator is harmless
/// because it is never special.
pub(crate) fn validate(
    separator: char,
    qualifier: char,
    quoting: Quoting,
    null_value: Option<&str>,
    buffer_capacity: usize,
) -> Result<()> {
    if buffer_capacity == 0 {
        return Err(Error::Config(
            "buffer capacity cannot be less than 1".to_string(),
        ));
    }
    let qualifier = if quoting.is_enabled() { Some(qualifier) } else { None };
    if let Some(q) = qualifier {
        if q == separator {
            return Err(Error::Config(format!(
                "separator {:?} and qualifier {:?} must be distinct",
                separator, q,
            )));
        }
    }
    if let Some(marker) = null_value {
        if marker.contains(separator) {
            return Err(Error::Config(format!(
                "null-marker {:?} cannot contain the separator {:?}",
                marker, separator,
            )));
        }
        if let Some(q) = qualifier {
            if marker.contains(q) {
                return Err(Error::Config(format!(
                    "null-marker {:?} cannot contain the qualifier {:?}",
                    marker, q,
                )));
            }
        }
        if marker.contains('\r') || marker.contains('\n') {
            return Err(Error::Config(format!(
                "null-marker {:?} cannot contain line breaks",
                marker,
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_separator_equal_to_qualifier() {
        assert!(validate(',', ',', Quoting::AsNeeded, None, 1024).is_err());
    }

    #[test]
    fn separator_equal_to_qualifier_ok_without_quoting() {
        assert!(validate(',', ',', Quoting::None, None, 1024).is_ok());
    }

    #[test]
    fn rejects_marker_containing_separator() {
        let res = validate(',', '"', Quoting::Always, Some("a,b"), 1024);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_marker_containing_qualifier() {
        let res = validate(',', '"', Quoting::Always, Some("\"x\""), 1024);
        assert!(res.is_err());
    }

    #[test]
    fn marker_containing_qualifier_ok_without_quoting() {
        let res = validate(',', '"', Quoting::None, Some("\"x\""), 1024);
        assert!(res.is_ok());
    }

    #[test]
    fn rejects_marker_containing_newline() {
        let res = validate(',', '"', Quoting::Always, Some("a\nb"), 1024);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_zero_buffer_capacity() {
        assert!(validate(',', '"', Quoting::Always, None, 0).is_err());
    }

    #[test]
    fn newline_text() {
        assert_eq!(NewLine::Windows.as_str(), "\r\n");
        assert_eq!(NewLine::Unix.as_str(), "\n");
        assert_eq!(NewLine::OldMac.as_str(), "\r");
    }
}
