use shadow_rs::ShadowBuilder;

fn main() {
    // Build metadata behind `pkg_version()` and the `--version` text
    ShadowBuilder::builder()
        .build()
        .expect("Failed to generate build metadata");
}
