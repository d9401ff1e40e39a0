use recurve_error::{RecurveResult, recurve_err};

/// Which way the recurrence walks the time axis. Bidirectional runs one
/// forward and one reverse pass over the same input and interleaves their
/// outputs.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
    Bidirectional,
}

impl Direction {
    /// Parse the ONNX `direction` attribute string.
    pub fn parse(value: &str) -> RecurveResult<Self> {
        match value.to_ascii_lowercase().as_str() {
            "forward" => Ok(Direction::Forward),
            "reverse" => Ok(Direction::Reverse),
            "bidirectional" => Ok(Direction::Bidirectional),
            other => Err(recurve_err!(InvalidArgument: "unknown direction '{}'", other)),
        }
    }

    pub fn num_directions(&self) -> usize {
        match self {
            Direction::Bidirectional => 2,
            _ => 1,
        }
    }

    pub fn is_reverse(&self) -> bool {
        matches!(self, Direction::Reverse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_onnx_attribute_strings() {
        assert_eq!(Direction::parse("forward").unwrap(), Direction::Forward);
        assert_eq!(Direction::parse("Reverse").unwrap(), Direction::Reverse);
        assert_eq!(
            Direction::parse("bidirectional").unwrap(),
            Direction::Bidirectional
        );
        assert!(Direction::parse("sideways").is_err());
    }

    #[test]
    fn num_directions_is_two_only_for_bidirectional() {
        assert_eq!(Direction::Forward.num_directions(), 1);
        assert_eq!(Direction::Reverse.num_directions(), 1);
        assert_eq!(Direction::Bidirectional.num_directions(), 2);
    }
}
