// src/packages/compare.rs

//! Tie-break between two versions of the same soname requirement
//!
//! `libc.so.6()` < `libc.so.6(GLIBC_2.3.4)(64bit)` < `libc.so.6(GLIBC_2.4)`

use rpm::Evr;
use std::cmp::Ordering;

/// Which of two compared dependency names is the stronger requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyOrdering {
    /// Both names carry the same (or no) version qualifier
    Equal,
    /// The first name is the stronger requirement
    FirstWins,
    /// The second name is the stronger requirement
    SecondWins,
    /// Both names are malformed; the caller keeps what it has
    Incomparable,
}

/// Compare two dependency names by their parenthesized version clause
///
/// The names are expected to share everything before the first `(`. A name
/// without a clause, with an empty clause or with a clause holding no digit
/// loses against one that has a version. The versions themselves are
/// compared with rpm's version ordering ([`rpm::Evr`]), starting at the
/// first digit of each clause.
pub fn compare_dependency(dep1: &str, dep2: &str) -> DependencyOrdering {
    use DependencyOrdering::{Equal, FirstWins, Incomparable, SecondWins};

    if dep1 == dep2 {
        return Equal;
    }

    let b1 = dep1.as_bytes();
    let b2 = dep2.as_bytes();

    let (open1, open2) = match (dep1.find('('), dep2.find('(')) {
        (None, None) => return Equal,
        (None, Some(_)) => return SecondWins,
        (Some(_), None) => return FirstWins,
        (Some(o1), Some(o2)) => (o1, o2),
    };

    let close1 = dep1[open1..].find(')').map(|p| open1 + p);
    let close2 = dep2[open2..].find(')').map(|p| open2 + p);
    let (close1, close2) = match (close1, close2) {
        (None, None) => return Incomparable,
        (None, Some(_)) => return SecondWins,
        (Some(_), None) => return FirstWins,
        (Some(c1), Some(c2)) => (c1, c2),
    };

    let start1 = open1 + 1;
    let start2 = open2 + 1;
    match (start1 == close1, start2 == close2) {
        (true, true) => return Equal,
        (true, false) => return SecondWins,
        (false, true) => return FirstWins,
        (false, false) => {}
    }

    // The digit scan may run past the closing parenthesis, e.g. into "(64bit)"
    let digit1 = first_digit(b1, start1);
    let digit2 = first_digit(b2, start2);
    match (digit1 > close1, digit2 > close2) {
        (true, true) => return Equal,
        (true, false) => return SecondWins,
        (false, true) => return FirstWins,
        (false, false) => {}
    }

    // Version-only EVRs: a clause may hold ':' or '-' that must not split it
    let version1 = Evr::new("", &dep1[digit1..close1], "");
    let version2 = Evr::new("", &dep2[digit2..close2], "");
    match version1.cmp(&version2) {
        Ordering::Greater => FirstWins,
        Ordering::Equal => Equal,
        Ordering::Less => SecondWins,
    }
}

fn first_digit(bytes: &[u8], from: usize) -> usize {
    bytes[from..]
        .iter()
        .position(u8::is_ascii_digit)
        .map_or(bytes.len(), |p| from + p)
}

#[cfg(test)]
mod tests {
    use super::DependencyOrdering::*;
    use super::*;

    #[test]
    fn test_no_parentheses() {
        assert_eq!(compare_dependency("libc.so.6", "libc.so.6"), Equal);
        assert_eq!(compare_dependency("libc.so.6", "libc.so.6 "), Equal);
    }

    #[test]
    fn test_presence_beats_absence() {
        assert_eq!(compare_dependency("libc.so.6", "libc.so.6(GLIBC_2.4)"), SecondWins);
        assert_eq!(compare_dependency("libc.so.6(GLIBC_2.4)", "libc.so.6"), FirstWins);
    }

    #[test]
    fn test_unclosed_parentheses() {
        assert_eq!(compare_dependency("libc.so.6(GLIBC_2.4", "libc.so.6(GLIBC_2.3"), Incomparable);
        assert_eq!(compare_dependency("libc.so.6(GLIBC_2.4", "libc.so.6(GLIBC_2.3)"), SecondWins);
        assert_eq!(compare_dependency("libc.so.6(GLIBC_2.4)", "libc.so.6(GLIBC_2.3"), FirstWins);
    }

    #[test]
    fn test_empty_clause_loses() {
        assert_eq!(compare_dependency("libc.so.6()", "libc.so.6()(64bit)"), Equal);
        assert_eq!(compare_dependency("libc.so.6()", "libc.so.6(GLIBC_2.4)"), SecondWins);
        assert_eq!(compare_dependency("libc.so.6(GLIBC_2.4)", "libc.so.6()(64bit)"), FirstWins);
    }

    #[test]
    fn test_clause_without_digits_loses() {
        assert_eq!(
            compare_dependency("libc.so.6(GLIBC_PRIVATE)", "libc.so.6(GLIBC_2.2.5)"),
            SecondWins
        );
        // the digit of "(64bit)" lies outside the first clause
        assert_eq!(
            compare_dependency("libc.so.6(GLIBC_2.2.5)(64bit)", "libc.so.6(GLIBC_PRIVATE)(64bit)"),
            FirstWins
        );
        assert_eq!(
            compare_dependency("libc.so.6(GLIBC_PRIVATE)", "libc.so.6(GLIBC_ABI)"),
            Equal
        );
    }

    #[test]
    fn test_versions_compared() {
        assert_eq!(
            compare_dependency("libc.so.6(GLIBC_2.3.4)(64bit)", "libc.so.6(GLIBC_2.4)(64bit)"),
            SecondWins
        );
        assert_eq!(
            compare_dependency("libc.so.6(GLIBC_2.34)(64bit)", "libc.so.6(GLIBC_2.4)(64bit)"),
            FirstWins
        );
        assert_eq!(
            compare_dependency("libc.so.6(GLIBC_2.4)", "libc.so.6(GLIBC_2.4)(64bit)"),
            Equal
        );
        assert_eq!(compare_dependency("libfoo(2.01)", "libfoo(2.1)"), Equal);
    }

    #[test]
    fn test_tilde_and_caret_clauses() {
        assert_eq!(compare_dependency("libfoo(1.0~rc1)", "libfoo(1.0)"), SecondWins);
        assert_eq!(compare_dependency("libfoo(1.0^git1)", "libfoo(1.0)"), FirstWins);
        assert_eq!(compare_dependency("libfoo(1.0^git1)", "libfoo(1.0.1)"), SecondWins);
    }

    #[test]
    fn test_clause_is_not_split_as_evr() {
        // read as epoch:version-release these would compare the other way
        assert_eq!(compare_dependency("libfoo(1-9)", "libfoo(1.5)"), FirstWins);
        assert_eq!(compare_dependency("libfoo(0:9)", "libfoo(1.2)"), SecondWins);
    }
}
