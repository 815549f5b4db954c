use std::{env, fs, path::Path, process};

use anyhow::{bail, Context, Result};

use pop::bytecode::{asm, disasm, lower};
use pop::frontend::token_dumper::TokenDumper;
use pop::frontend::Lexer;
use pop::runtime::Vm;

fn main() {
    let args: Vec<String> = env::args().collect();

    let tokens_only = args.contains(&"--tokens".to_string());
    let no_color = args.contains(&"--no-color".to_string());
    let pretty = args.contains(&"--pretty".to_string());
    let ast = args.contains(&"--ast".to_string());
    let list = args.contains(&"--list".to_string());
    let dis = args.contains(&"--dis".to_string());
    let output = flag_value(&args, "-o").or_else(|| flag_value(&args, "--output"));

    if args.contains(&"--help".to_string()) || args.contains(&"-h".to_string()) {
        print_usage(&args[0]);
        return;
    }

    // first non-flag argument is the filename
    let filename = args
        .iter()
        .skip(1)
        .filter(|a| !a.starts_with('-'))
        .find(|a| Some(a.as_str()) != output.as_deref());

    let filename = match filename {
        Some(filename) => filename,
        None => {
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    let mode = if tokens_only {
        Mode::Tokens { no_color, pretty }
    } else if ast {
        Mode::Ast
    } else if list {
        Mode::List
    } else if dis {
        Mode::Dis
    } else {
        Mode::Run { output }
    };

    match drive(filename, mode) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e:#}");
            process::exit(1);
        }
    }
}

enum Mode {
    Tokens { no_color: bool, pretty: bool },
    Ast,
    List,
    Dis,
    Run { output: Option<String> },
}

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    let at = args.iter().position(|a| a == flag)?;
    args.get(at + 1).cloned()
}

fn print_usage(program: &str) {
    let name = Path::new(program)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("pop");
    println!("POP - byte-code compiler and virtual machine");
    println!();
    println!("Usage:");
    println!("  {name} <file.pop>            Compile and run a program");
    println!("  {name} <file.pbc>            Run a compiled image");
    println!("  {name} -o FILE <file.pop>    Compile to a .pbc image");
    println!("  {name} --tokens <file>       Show tokens only (--no-color, --pretty)");
    println!("  {name} --ast <file>          Show the parsed syntax tree");
    println!("  {name} --list <file>         Show the lowered instruction listing");
    println!("  {name} --dis <file>          Show the assembled image disassembly");
    println!("  {name} --help, -h            Show this help");
}

fn drive(filename: &str, mode: Mode) -> Result<i32> {
    // a .pbc argument is an already-compiled image
    if Path::new(filename).extension().and_then(|e| e.to_str()) == Some("pbc") {
        let image =
            fs::read(filename).with_context(|| format!("failed to read '{filename}'"))?;
        return run_image(image);
    }

    let source = fs::read_to_string(filename)
        .with_context(|| format!("failed to read '{filename}'"))?;

    match mode {
        Mode::Tokens { no_color, pretty } => {
            let tokens = Lexer::with_filename(&source, filename)
                .tokenize()
                .map_err(anyhow::Error::from)?;
            let mut dumper = TokenDumper::new();
            if no_color {
                dumper = dumper.no_color();
            }
            if pretty {
                dumper = dumper.pretty();
            }
            dumper.dump(&tokens);
            Ok(0)
        }
        Mode::Ast => {
            let ast = pop::parse(&source, filename).map_err(anyhow::Error::from)?;
            println!("{ast:#?}");
            Ok(0)
        }
        Mode::List => {
            let ast = pop::parse(&source, filename).map_err(anyhow::Error::from)?;
            let ops = lower(&ast).map_err(anyhow::Error::from)?;
            print!("{}", asm::listing(&ops));
            Ok(0)
        }
        Mode::Dis => {
            let image = pop::compile_file(&source, filename).map_err(anyhow::Error::from)?;
            let decoded = disasm::disassemble(&image).map_err(anyhow::Error::from)?;
            print!("{}", disasm::listing(&decoded));
            Ok(0)
        }
        Mode::Run { output } => {
            let image = pop::compile_file(&source, filename).map_err(anyhow::Error::from)?;
            match output {
                Some(path) => {
                    fs::write(&path, &image)
                        .with_context(|| format!("failed to write '{path}'"))?;
                    Ok(0)
                }
                None => run_image(image),
            }
        }
    }
}

fn run_image(image: Vec<u8>) -> Result<i32> {
    if image.is_empty() {
        bail!("empty byte-code image");
    }
    let mut vm = Vm::new(image);
    let code = vm.execute().map_err(anyhow::Error::from)?;
    Ok(code)
}
