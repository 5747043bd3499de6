#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// The command finished and produced at least one match.
    Success,
    /// The command finished without a single match.
    NoMatch,
    /// Option parsing failed, a fatal I/O error occurred, or the run was canceled.
    Error,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        match code {
            ExitCode::Success => 0,
            ExitCode::NoMatch => 1,
            ExitCode::Error => 2,
        }
    }
}

impl ExitCode {
    /// Exit code for a finished search, derived from the number of matches.
    pub fn from_match_count(count: u64) -> Self {
        if count > 0 {
            ExitCode::Success
        } else {
            ExitCode::NoMatch
        }
    }

    pub fn exit(self) -> ! {
        std::process::exit(self.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_count_maps_to_exit_code() {
        assert_eq!(ExitCode::from_match_count(0), ExitCode::NoMatch);
        assert_eq!(ExitCode::from_match_count(1), ExitCode::Success);
        assert_eq!(ExitCode::from_match_count(250), ExitCode::Success);
    }

    #[test]
    fn numeric_values() {
        assert_eq!(i32::from(ExitCode::Success), 0);
        assert_eq!(i32::from(ExitCode::NoMatch), 1);
        assert_eq!(i32::from(ExitCode::Error), 2);
    }
}
