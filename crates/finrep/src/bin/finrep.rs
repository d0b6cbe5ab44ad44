//! The finrep binary.

fn main() -> std::process::ExitCode {
    finrep::cmd::main()
}
