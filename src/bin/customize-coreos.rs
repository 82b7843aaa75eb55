use std::process::ExitCode;

mod workflows;

fn main() -> ExitCode {
    coreos_customizer::logging::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let invocation = match workflows::parse_args(&args) {
        Ok(workflows::Invocation::Help) => {
            println!("{}", workflows::usage());
            return ExitCode::SUCCESS;
        }
        Ok(invocation) => invocation,
        Err(err) => {
            eprintln!("{:#}\n\n{}", err, workflows::usage());
            return ExitCode::from(2);
        }
    };

    workflows::finish(workflows::run(invocation), &mut std::io::stderr())
}
