/// Git metadata captured by the build script, when the crate was built from a checkout.
pub(crate) struct BuildInfo {
    pub commit_sha1: Option<&'static str>,
    pub branch: Option<&'static str>,
    pub git_dirty: Option<&'static str>,
}

pub(crate) static BUILD_INFO: BuildInfo = BuildInfo {
    commit_sha1: option_env!("VERGEN_GIT_SHA"),
    branch: option_env!("VERGEN_GIT_BRANCH"),
    git_dirty: option_env!("VERGEN_GIT_DIRTY"),
};
