use std::io::BufRead;

use runners::net::type_hash::type_hash;

fn print_hash(name: &str) {
    let hash = type_hash(name);
    println!("{hash:#010x}  {hash:>10}  {name}");
}

fn main() {
    let names: Vec<String> = std::env::args().skip(1).collect();
    if !names.is_empty() {
        for name in &names {
            print_hash(name);
        }
        return;
    }
    for line in std::io::stdin().lock().lines() {
        match line {
            Ok(line) => {
                let name = line.trim();
                if !name.is_empty() {
                    print_hash(name);
                }
            }
            Err(err) => {
                eprintln!("type_hash: read failed: {}", err);
                std::process::exit(1);
            }
        }
    }
}
