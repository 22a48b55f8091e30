//! ObscurCore CLI — operational tooling for packing and unpacking archives.
//!
//! Usage:
//!   obscurcore keygen --output <dir> [--curve x25519|p256]
//!   obscurcore pack --key <pre_key_file> --output <file> <input>...
//!   obscurcore unpack --key <pre_key_file> --input <file> --output <dir>

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use obscurcore::{PackageReader, PackageWriter};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result = match args[1].as_str() {
        "keygen" => cmd_keygen(&args[2..]),
        "pack" => cmd_pack(&args[2..]),
        "unpack" => cmd_unpack(&args[2..]),
        "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        "--version" | "-V" => {
            println!("obscurcore {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        cmd => {
            eprintln!("error: unknown command '{}'", cmd);
            print_usage();
            Err("unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    eprintln!(
        r#"ObscurCore CLI — encrypted, authenticated multi-item archives

USAGE:
    obscurcore <COMMAND> [OPTIONS]

COMMANDS:
    keygen      Generate a pre-key (symmetric mode, the default)
    pack        Build a package from one or more input files
    unpack      Extract a package into a directory

EXAMPLES:
    # Generate a pre-key
    obscurcore keygen --output ./keys

    # Pack
    obscurcore pack --key ./keys/pre.key --output archive.obscur a.txt b.bin

    # Unpack
    obscurcore unpack --key ./keys/pre.key --input archive.obscur --output ./out

OPTIONS:
    -h, --help       Print help
    -V, --version    Print version
"#
    );
}

fn cmd_keygen(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut output_dir = PathBuf::from(".");

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                i += 1;
                output_dir = PathBuf::from(args.get(i).ok_or("missing output path")?);
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    fs::create_dir_all(&output_dir)?;

    let mut pre_key = vec![0u8; 32];
    use obscurcore::primitives::csprng::Csprng;
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed)?;
    let mut rng = Csprng::seed(&seed)?;
    rng.next_bytes(&mut pre_key);

    let key_path = output_dir.join("pre.key");
    fs::write(&key_path, &pre_key)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&key_path)?.permissions();
        perms.set_mode(0o600);
        fs::set_permissions(&key_path, perms)?;
    }

    eprintln!("Generated pre-key: {} ({} bytes, mode 600)", key_path.display(), pre_key.len());

    Ok(())
}

fn cmd_pack(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut key_path: Option<PathBuf> = None;
    let mut output_path: Option<PathBuf> = None;
    let mut inputs: Vec<PathBuf> = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--key" | "-k" => {
                i += 1;
                key_path = Some(PathBuf::from(args.get(i).ok_or("missing key path")?));
            }
            "--output" | "-o" => {
                i += 1;
                output_path = Some(PathBuf::from(args.get(i).ok_or("missing output path")?));
            }
            other => inputs.push(PathBuf::from(other)),
        }
        i += 1;
    }

    let key_path = key_path.ok_or("missing --key")?;
    let output_path = output_path.ok_or("missing --output")?;
    if inputs.is_empty() {
        return Err("pack requires at least one input file".into());
    }

    let pre_key = fs::read(&key_path)?;
    let mut writer = PackageWriter::with_symmetric_key(pre_key);
    for path in &inputs {
        writer.add_file(path)?;
    }

    let mut output = fs::File::create(&output_path)?;
    writer.write(&mut output, true)?;

    eprintln!("Packed {} item(s) -> {}", inputs.len(), output_path.display());

    Ok(())
}

fn cmd_unpack(args: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let mut key_path: Option<PathBuf> = None;
    let mut input_path: Option<PathBuf> = None;
    let mut output_dir: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--key" | "-k" => {
                i += 1;
                key_path = Some(PathBuf::from(args.get(i).ok_or("missing key path")?));
            }
            "--input" | "-i" => {
                i += 1;
                input_path = Some(PathBuf::from(args.get(i).ok_or("missing input path")?));
            }
            "--output" | "-o" => {
                i += 1;
                output_dir = Some(PathBuf::from(args.get(i).ok_or("missing output dir")?));
            }
            _ => return Err(format!("unknown option: {}", args[i]).into()),
        }
        i += 1;
    }

    let key_path = key_path.ok_or("missing --key")?;
    let input_path = input_path.ok_or("missing --input")?;
    let output_dir = output_dir.ok_or("missing --output")?;

    let pre_key = fs::read(&key_path)?;
    let packed = fs::read(&input_path)?;
    fs::create_dir_all(&output_dir)?;

    let reader = PackageReader::with_symmetric_key(pre_key);
    let mut cursor = Cursor::new(packed);
    let manifest = reader.read_manifest(&mut cursor)?;
    let item_count = manifest.items().len();

    let output_dir_for_sinks = output_dir.clone();
    reader.extract_to(manifest, &mut cursor, move |item| {
        let dest = sanitized_dest(&output_dir_for_sinks, &item.relative_path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Box::new(fs::File::create(dest)?) as Box<dyn std::io::Write>)
    })?;

    eprintln!("Unpacked {} item(s) -> {}", item_count, output_dir.display());

    Ok(())
}

/// Strips any path components that would escape `output_dir` (leading `/`,
/// `..`) before joining, so a malicious manifest cannot write outside it.
fn sanitized_dest(output_dir: &Path, relative_path: &str) -> PathBuf {
    let mut dest = output_dir.to_path_buf();
    for component in Path::new(relative_path).components() {
        if let std::path::Component::Normal(part) = component {
            dest.push(part);
        }
    }
    dest
}
