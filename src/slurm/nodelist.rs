// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

//! Expansion of compact Slurm nodelist notation (`gpu[1-3,5],smp1`) into
//! explicit node names.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid nodelist format: {0:?}")]
pub struct FormatError(pub String);

/// Expand a compact nodelist into one name per node, in the order written,
/// ranges ascending. A name without bracket notation passes through
/// unchanged, so expanding an already-expanded name is a no-op. An empty
/// input (a pending job has no assigned nodes) yields an empty list.
pub fn expand_nodelist(nodelist: &str) -> Result<Vec<String>, FormatError> {
    let nodelist = nodelist.trim();
    if nodelist.is_empty() {
        return Ok(Vec::new());
    }

    let mut nodes = Vec::new();
    for segment in split_segments(nodelist)? {
        expand_segment(segment, nodelist, &mut nodes)?;
    }
    Ok(nodes)
}

/// Split on commas that sit outside bracket groups: `a[1,3],b2` has two
/// segments, `a[1,3]` and `b2`.
fn split_segments(nodelist: &str) -> Result<Vec<&str>, FormatError> {
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in nodelist.char_indices() {
        match c {
            '[' => depth += 1,
            ']' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| FormatError(nodelist.to_string()))?;
            }
            ',' if depth == 0 => {
                segments.push(&nodelist[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(FormatError(nodelist.to_string()));
    }
    segments.push(&nodelist[start..]);
    Ok(segments)
}

fn expand_segment(segment: &str, input: &str, out: &mut Vec<String>) -> Result<(), FormatError> {
    let err = || FormatError(input.to_string());

    let Some((base, rest)) = segment.split_once('[') else {
        if segment.is_empty() {
            return Err(err());
        }
        out.push(segment.to_string());
        return Ok(());
    };

    let ranges = rest.strip_suffix(']').ok_or_else(err)?;
    if base.is_empty() || ranges.is_empty() || ranges.contains('[') {
        return Err(err());
    }

    for part in ranges.split(',') {
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: u64 = lo.parse().map_err(|_| err())?;
                let hi: u64 = hi.parse().map_err(|_| err())?;
                for i in lo..=hi {
                    out.push(format!("{base}{i}"));
                }
            }
            None => {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(err());
                }
                out.push(format!("{base}{part}"));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_single_range() {
        assert_eq!(expand_nodelist("node[1-2]").unwrap(), vec!["node1", "node2"]);
    }

    #[test]
    fn expands_multiple_ranges() {
        assert_eq!(
            expand_nodelist("gpu[1-3,5-7]").unwrap(),
            vec!["gpu1", "gpu2", "gpu3", "gpu5", "gpu6", "gpu7"]
        );
    }

    #[test]
    fn plain_name_passes_through() {
        assert_eq!(expand_nodelist("smp1").unwrap(), vec!["smp1"]);
    }

    #[test]
    fn expansion_is_idempotent_on_expanded_names() {
        let once = expand_nodelist("node[3-4]").unwrap();
        for name in &once {
            assert_eq!(expand_nodelist(name).unwrap(), vec![name.clone()]);
        }
    }

    #[test]
    fn mixes_bracketed_and_plain_segments() {
        assert_eq!(
            expand_nodelist("gpu[1-2],smp3,x[5]").unwrap(),
            vec!["gpu1", "gpu2", "smp3", "x5"]
        );
    }

    #[test]
    fn singleton_keeps_leading_zeros() {
        assert_eq!(expand_nodelist("node[07]").unwrap(), vec!["node07"]);
    }

    #[test]
    fn empty_input_is_empty_list() {
        assert!(expand_nodelist("").unwrap().is_empty());
    }

    #[test]
    fn unbalanced_bracket_is_an_error() {
        let err = expand_nodelist("node[1").unwrap_err();
        assert_eq!(err, FormatError("node[1".to_string()));
    }

    #[test]
    fn stray_closing_bracket_is_an_error() {
        assert!(expand_nodelist("node1]").is_err());
    }

    #[test]
    fn non_numeric_range_is_an_error() {
        assert!(expand_nodelist("node[a-b]").is_err());
        assert!(expand_nodelist("node[1-x]").is_err());
        assert!(expand_nodelist("node[]").is_err());
    }

    #[test]
    fn error_names_the_offending_input() {
        let err = expand_nodelist("gpu[9").unwrap_err();
        assert!(err.to_string().contains("gpu[9"));
    }
}
