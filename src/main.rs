fn main() -> anyhow::Result<()> {
    props_rs::cli::run(std::env::args_os())
}
