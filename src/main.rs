use std::path::PathBuf;

use chapter_deck::model::ItemId;

const HELP: &str = "chapter-deck - Manage a reading item's chapter list from the terminal.

  --version, -V        Show version and exit
  --help,    -h        Show this help message
  --db <path>          Use the library database at <path>
  --item <id>          Open the item with id <id>
  --import <file>      Import items and chapters from a YAML file and exit
  --list               List library items and exit";

enum Command {
    Run,
    Version,
    Help,
    Import(PathBuf),
    List,
}

struct Args {
    command: Command,
    db_path: Option<PathBuf>,
    item: Option<ItemId>,
}

fn main() {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("error: {err}\n\n{HELP}");
            std::process::exit(2);
        }
    };

    let result = match args.command {
        Command::Version => {
            println!("chapter-deck {}", chapter_deck::VERSION);
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            Ok(())
        }
        Command::Import(file) => chapter_deck::app::import(args.db_path, &file).map(|ids| {
            println!("Imported {} item(s).", ids.len());
        }),
        Command::List => chapter_deck::app::list(args.db_path).map(|listing| {
            if listing.is_empty() {
                println!("Library is empty.");
            } else {
                print!("{listing}");
            }
        }),
        Command::Run => chapter_deck::run(chapter_deck::RunOptions {
            db_path: args.db_path,
            item: args.item,
        }),
    };

    if let Err(err) = result {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<Args, String> {
    let mut parsed = Args {
        command: Command::Run,
        db_path: None,
        item: None,
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => parsed.command = Command::Version,
            "--help" | "-h" => parsed.command = Command::Help,
            "--list" => parsed.command = Command::List,
            "--import" => {
                let file = args.next().ok_or("--import needs a file")?;
                parsed.command = Command::Import(PathBuf::from(file));
            }
            "--db" => {
                let path = args.next().ok_or("--db needs a path")?;
                parsed.db_path = Some(PathBuf::from(path));
            }
            "--item" => {
                let value = args.next().ok_or("--item needs an id")?;
                let id = value
                    .parse::<i64>()
                    .map_err(|_| format!("invalid item id {value:?}"))?;
                parsed.item = Some(ItemId(id));
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }
    Ok(parsed)
}
