use std::ffi::OsString;
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use jlcd::{Image, TileFile, TileFileWriter, TileGeometry, container};

enum Command {
    Encode,
    Decode,
    Compare,
}

fn main() -> Result<()> {
    let mut command = None;
    let mut geometry = TileGeometry::DEFAULT;
    let mut verbose = false;
    let mut paths: Vec<PathBuf> = vec![];

    let mut parser = lexopt::Parser::from_env();
    while let Some(arg) = parser.next()? {
        use lexopt::prelude::*;
        match arg {
            Short(c @ ('e' | 'd' | 'c')) => {
                let rest = parser
                    .optional_value()
                    .map(|v| v.string())
                    .transpose()?
                    .unwrap_or_default();
                let flag = format!("-{c}{rest}");
                command = Some(match flag.as_str() {
                    "-en" => Command::Encode,
                    "-de" => Command::Decode,
                    "-cp" => Command::Compare,
                    _ => bail!("unknown option {flag}"),
                });
            }
            Long("encode") => command = Some(Command::Encode),
            Long("decode") => command = Some(Command::Decode),
            Long("compare") => command = Some(Command::Compare),
            Long("tile") => geometry = parse_geometry(parser.value()?)?,
            Short('v') | Long("verbose") => verbose = true,
            Short('h') | Long("help") => print_help(0),
            Long("version") => {
                println!("jlcd {}", env!("CARGO_PKG_VERSION"));
                process::exit(0);
            }
            Value(val) if paths.len() < 2 => paths.push(val.into()),
            _ => return Err(arg.unexpected().into()),
        }
    }

    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .with_writer(std::io::stderr)
        .init();

    let Some(command) = command else {
        print_help(1);
    };
    let Some(infile) = paths.first().cloned() else {
        eprintln!("parameter is not enough!");
        print_help(1);
    };

    match command {
        Command::Encode => {
            let outfile = output_path(&paths, &infile, "jlcd");
            let image = Image::open(&infile)
                .with_context(|| format!("cannot open file: {}", infile.display()))?;
            info!(
                width = image.width(),
                height = image.height(),
                "image info"
            );
            let tiles = tile_count(&image, geometry);
            let writer = with_progress(tiles, |cb| {
                TileFileWriter::encode_image(&image, geometry, cb)
            })?;
            let stats = writer.stats();
            info!(
                min = stats.min,
                max = stats.max,
                average = stats.average(),
                "encoded bytes per tile"
            );
            let file = File::create(&outfile)
                .with_context(|| format!("fail to open output file: {}", outfile.display()))?;
            writer.write_to(BufWriter::new(file))?;
        }
        Command::Decode => {
            let outfile = output_path(&paths, &infile, "bmp");
            let file = File::open(&infile)
                .with_context(|| format!("fail to open file: {}", infile.display()))?;
            let mut tile_file = TileFile::open(BufReader::new(file))
                .with_context(|| format!("invalid tile file: {}", infile.display()))?;
            let header = *tile_file.header();
            info!(
                image_width = header.image_width,
                image_height = header.image_height,
                tile_width = header.tile_width,
                tile_height = header.tile_height,
                "tile file info"
            );
            let image = with_progress(header.tile_count as usize, |cb| {
                tile_file.decode_image(cb)
            })?;
            image
                .save(&outfile)
                .with_context(|| format!("fail to write {}", outfile.display()))?;
        }
        Command::Compare => {
            let Some(other) = paths.get(1) else {
                bail!("-cp needs two files");
            };
            let first = load_image(&infile)?;
            let second = load_image(other)?;
            info!(
                "file1 size: {}x{}, file2 size: {}x{}",
                first.width(),
                first.height(),
                second.width(),
                second.height()
            );
            match first.count_differences(&second) {
                None => {
                    warn!("the two files's size not equal");
                    process::exit(1);
                }
                Some(0) => info!("the two files are same"),
                Some(count) => {
                    warn!("there are {count} different pixels");
                    process::exit(1);
                }
            }
        }
    }

    Ok(())
}

fn print_help(exit_code: i32) -> ! {
    eprintln!("Usage: jlcd [OPTIONS] -{{en,de,cp}} infile [outfile]");
    eprintln!();
    eprintln!("  -en infile [outfile]   encode image `infile` to tile file (default `infile`.jlcd)");
    eprintln!("  -de infile [outfile]   decode tile file `infile` to image (default `infile`.bmp)");
    eprintln!("  -cp file1 file2        compare two images (image or tile file) pixel by pixel");
    eprintln!();
    eprintln!("  --tile WxH             tile size used when encoding (default 8x8)");
    eprintln!("  -v, --verbose          log every tile");
    eprintln!("  -h, --help             print help");
    eprintln!("  --version              print version");
    process::exit(exit_code);
}

fn parse_geometry(value: OsString) -> Result<TileGeometry> {
    let value = value.into_string().map_err(|_| anyhow::anyhow!("invalid tile size"))?;
    let (width, height) = value
        .split_once(['x', 'X'])
        .with_context(|| format!("tile size `{value}` is not WxH"))?;
    Ok(TileGeometry::new(width.parse()?, height.parse()?)?)
}

fn output_path(paths: &[PathBuf], infile: &Path, extension: &str) -> PathBuf {
    paths.get(1).cloned().unwrap_or_else(|| {
        let mut name = infile.as_os_str().to_owned();
        name.push(".");
        name.push(extension);
        let outfile = PathBuf::from(name);
        info!("output file is not assigned, we assign it to: {}", outfile.display());
        outfile
    })
}

fn tile_count(image: &Image, geometry: TileGeometry) -> usize {
    let (rows, columns) = geometry.grid(image.width(), image.height());
    rows as usize * columns as usize
}

fn load_image(path: &Path) -> Result<Image> {
    let mut data = vec![];
    File::open(path)
        .and_then(|mut file| file.read_to_end(&mut data))
        .with_context(|| format!("cannot open file: {}", path.display()))?;
    if data.starts_with(&container::MAGIC) {
        let mut tile_file = TileFile::open(Cursor::new(data))?;
        Ok(tile_file.decode_image(None)?)
    } else {
        Ok(Image::load_from_memory(&data)?)
    }
}

#[cfg(feature = "terminal")]
fn with_progress<T>(
    total: usize,
    f: impl FnOnce(Option<jlcd::ProgressCallback>) -> T,
) -> T {
    let mut pb = pbr::ProgressBar::new(total as u64);
    let result = f(Some(&mut |pos: usize| {
        pb.set(pos as u64);
    }));
    pb.finish();
    result
}

#[cfg(not(feature = "terminal"))]
fn with_progress<T>(
    _total: usize,
    f: impl FnOnce(Option<jlcd::ProgressCallback>) -> T,
) -> T {
    f(None)
}
