//! Idempotency check compiler.
//!
//! A check is a shell line whose own exit status says whether the effect
//! of the entry it belongs to is in place. The polarity is baked into the
//! string: [`pass_fail`] succeeds when the test succeeds, [`fail_pass`]
//! succeeds when the test fails (used after removals).
//!
//! Both also print `CHECK PASSED` or `CHECK FAILED` so the remote output
//! reads well in logs.

/// Check that passes when `test` exits 0.
pub fn pass_fail(test: &str) -> String {
    format!("{test} && echo CHECK PASSED || {{ echo CHECK FAILED; false; }}")
}

/// Check that passes when `test` exits non-zero.
pub fn fail_pass(test: &str) -> String {
    pass_fail(&format!("! {test}"))
}

/// Test that a file exists and is not empty
pub fn file_exists(path: &str) -> String {
    format!("test -s {path}")
}

/// Test that a directory exists
pub fn dir_exists(path: &str) -> String {
    format!("test -d {path}")
}

/// Test that a symbolic link exists
pub fn link_exists(path: &str) -> String {
    format!("test -L {path}")
}

/// Test that a dpkg package is fully installed.
///
/// After `apt-get remove` dpkg reports `deinstall ok config-files`, so this
/// test fails for removed packages and works with [`fail_pass`].
pub fn package_installed(package: &str) -> String {
    format!("dpkg -s {package} 2>/dev/null | grep -q 'ok installed'")
}

/// Test that a gem is installed
pub fn gem_installed(name: &str) -> String {
    format!("gem list --local 2>/dev/null | grep -q '^{name} '")
}

/// Test that a signing key shows up in the apt keyring
pub fn key_listed(name: &str) -> String {
    format!("apt-key list 2>/dev/null | grep -qi {name}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_fail() {
        assert_eq!(
            pass_fail("test -s dest"),
            "test -s dest && echo CHECK PASSED || { echo CHECK FAILED; false; }"
        );
    }

    #[test]
    fn test_fail_pass_negates_the_test() {
        assert_eq!(
            fail_pass("test -s file"),
            "! test -s file && echo CHECK PASSED || { echo CHECK FAILED; false; }"
        );
    }

    #[test]
    fn test_checks_are_deterministic() {
        assert_eq!(
            pass_fail(&package_installed("vim")),
            pass_fail(&package_installed("vim"))
        );
    }

    #[test]
    fn test_package_installed() {
        assert_eq!(
            package_installed("git"),
            "dpkg -s git 2>/dev/null | grep -q 'ok installed'"
        );
    }

    #[test]
    fn test_key_listed() {
        assert_eq!(key_listed("teamkey"), "apt-key list 2>/dev/null | grep -qi teamkey");
    }
}
