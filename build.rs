use anyhow::Result;
use vergen::EmitBuilder;

// Emits VERGEN_GIT_SHA and VERGEN_BUILD_DATE for `marp --version`.
fn main() -> Result<()> {
    EmitBuilder::builder()
        .build_date()
        .git_sha(true)
        .emit()?;
    Ok(())
}
