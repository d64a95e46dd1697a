fn main() -> anyhow::Result<()> {
    duenote::cli::run()
}
