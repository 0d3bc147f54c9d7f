fn main() -> anyhow::Result<()> {
    storyreel_lib::run()
}
