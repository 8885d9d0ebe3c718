//! # Boot Command Line
//!
//! Minimal option lookup for the one policy decision this stage makes.
//! Anything fancier (values, quoting) belongs to the kernel proper.

use crate::params::BootParams;

/// Report whether the command line contains `name` as a standalone token.
///
/// Tokens are separated by blanks and the scan stops at the terminating NUL.
/// A `name=value` option does not match a bare `name` lookup, and `name`
/// never matches inside a longer token (`nokaslr` does not match `kaslr`).
#[must_use]
pub fn has_flag(params: &BootParams, name: &str) -> bool {
    let bytes = params.cmdline_bytes();
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    bytes[..end]
        .split(|&b| b == b' ' || b == b'\t')
        .any(|token| token == name.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Cmdline {
        // Keeps the backing buffer alive while `params` points at it.
        _buf: Box<[u8]>,
        params: BootParams,
    }

    fn with_cmdline(line: &str) -> Cmdline {
        let buf: Box<[u8]> = line.as_bytes().into();
        let mut params = BootParams::empty();
        params.cmdline_ptr = buf.as_ptr() as u64;
        params.cmdline_size = buf.len() as u64;
        Cmdline { _buf: buf, params }
    }

    #[test]
    fn finds_standalone_token() {
        let boot = with_cmdline("auto nokaslr quiet\0");
        assert!(has_flag(&boot.params, "nokaslr"));
        assert!(has_flag(&boot.params, "quiet"));
        assert!(has_flag(&boot.params, "auto"));
    }

    #[test]
    fn does_not_match_inside_longer_token() {
        let boot = with_cmdline("nokaslr\0");
        assert!(!has_flag(&boot.params, "kaslr"));
    }

    #[test]
    fn does_not_match_key_value_options() {
        let boot = with_cmdline("kaslr=off debug\0");
        assert!(!has_flag(&boot.params, "kaslr"));
        assert!(has_flag(&boot.params, "debug"));
    }

    #[test]
    fn stops_at_terminating_nul() {
        let boot = with_cmdline("quiet\0kaslr");
        assert!(!has_flag(&boot.params, "kaslr"));
    }

    #[test]
    fn missing_cmdline_matches_nothing() {
        let params = BootParams::empty();
        assert!(!has_flag(&params, "kaslr"));
    }

    #[test]
    fn tabs_separate_tokens() {
        let boot = with_cmdline("auto\tkaslr\0");
        assert!(has_flag(&boot.params, "kaslr"));
    }
}
