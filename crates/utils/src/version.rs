use std::sync::LazyLock;

use crate::build_info::BUILD_INFO;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format!(
        "{}-{}{}",
        env!("IMAGE_VERSION"),
        short_sha(BUILD_INFO.commit_sha1.unwrap_or("unknown")),
        dirty_suffix(BUILD_INFO.git_dirty)
    )
});

/// Branch the binary was built from, if known.
pub fn branch() -> Option<&'static str> {
    BUILD_INFO.branch
}

fn short_sha(sha: &str) -> &str {
    sha.get(..8).unwrap_or(sha)
}

fn dirty_suffix(git_dirty: Option<&str>) -> &'static str {
    match git_dirty {
        Some("true") => "-dirty",
        _ => "",
    }
}
