use std::io::Write;
use std::path::{Path, PathBuf};

use convertkit_core::delimited::{csv_to_json, json_to_csv, CsvToJsonOptions, JsonToCsvOptions};
use convertkit_core::encoding::decode_utf8;
use convertkit_core::excel::{csv_to_excel, excel_to_csv, CsvToExcelOptions, ExcelToCsvOptions};
use convertkit_core::html_table::{html_table_to_json, HtmlTableOptions};
use convertkit_core::json::{format_json, FormatMode, FormatOptions};
use convertkit_core::text::{clean_text, CleanOptions, DEFAULT_MAX_LENGTH};
use convertkit_core::xml::{json_to_xml, xml_to_json, JsonToXmlOptions, XmlToJsonOptions};
use convertkit_core::{Conversion, Limits};

use crate::config::{FetchConfig, FetchOptions, LimitOptions};
use crate::prelude::{eprintln, *};

#[derive(Debug, clap::Parser)]
#[command(name = "convert")]
#[command(about = "Convert local files")]
pub struct App {
    #[command(subcommand)]
    pub command: Commands,

    #[clap(flatten)]
    pub limits: LimitOptions,
}

#[derive(Debug, clap::Subcommand)]
pub enum Commands {
    /// CSV to a JSON array of records
    #[clap(name = "csv-to-json")]
    CsvToJson(CsvToJsonArgs),

    /// JSON array of records to CSV
    #[clap(name = "json-to-csv")]
    JsonToCsv(JsonToCsvArgs),

    /// CSV to an Excel workbook
    #[clap(name = "csv-to-excel")]
    CsvToExcel(CsvToExcelArgs),

    /// Excel worksheet to CSV
    #[clap(name = "excel-to-csv")]
    ExcelToCsv(ExcelToCsvArgs),

    /// Validate and pretty-print or minify JSON
    #[clap(name = "json-format")]
    JsonFormat(JsonFormatArgs),

    /// XML document to JSON
    #[clap(name = "xml-to-json")]
    XmlToJson(XmlToJsonArgs),

    /// JSON to an XML document
    #[clap(name = "json-to-xml")]
    JsonToXml(JsonToXmlArgs),

    /// HTML table to a JSON array of records
    #[clap(name = "html-table-to-json")]
    HtmlTableToJson(HtmlTableToJsonArgs),

    /// Download a CSV file and convert it to JSON
    #[clap(name = "csv-url-to-json")]
    CsvUrlToJson(CsvUrlToJsonArgs),

    /// Normalize free text
    #[clap(name = "text-clean")]
    TextClean(TextCleanArgs),
}

#[derive(Debug, Clone, clap::Args)]
pub struct Io {
    /// Input file
    pub input: PathBuf,

    /// Write the result to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Dialect {
    /// Field delimiter (`\t` or `tab` for tabs)
    #[arg(short, long, default_value = ",")]
    pub delimiter: String,

    /// Text encoding of the CSV data
    #[arg(short, long, default_value = "utf-8")]
    pub encoding: String,

    /// The first row is data, not column names
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct CsvToJsonArgs {
    #[clap(flatten)]
    pub io: Io,

    #[clap(flatten)]
    pub dialect: Dialect,

    /// Indent the JSON output
    #[arg(long)]
    pub pretty: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct JsonToCsvArgs {
    #[clap(flatten)]
    pub io: Io,

    /// Field delimiter
    #[arg(short, long, default_value = ",")]
    pub delimiter: String,

    /// Omit the header row
    #[arg(long)]
    pub no_header: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct CsvToExcelArgs {
    #[clap(flatten)]
    pub io: Io,

    #[clap(flatten)]
    pub dialect: Dialect,

    /// Worksheet name
    #[arg(long, default_value = "Sheet1")]
    pub sheet_name: String,
}

#[derive(Debug, Clone, clap::Args)]
pub struct ExcelToCsvArgs {
    #[clap(flatten)]
    pub io: Io,

    #[clap(flatten)]
    pub dialect: Dialect,

    /// Worksheet to read (default: the first one)
    #[arg(long)]
    pub sheet_name: Option<String>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct JsonFormatArgs {
    #[clap(flatten)]
    pub io: Io,

    /// Minify instead of pretty-printing
    #[arg(long)]
    pub compact: bool,

    /// Report syntax errors without their position
    #[arg(long)]
    pub no_validate: bool,

    /// Spaces per indentation level
    #[arg(long, default_value = "2")]
    pub indent: usize,

    /// Sort object keys
    #[arg(long)]
    pub sort_keys: bool,

    /// Escape non-ASCII characters
    #[arg(long)]
    pub ensure_ascii: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct XmlToJsonArgs {
    #[clap(flatten)]
    pub io: Io,

    /// Indent the JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Lower the nesting depth limit
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Lower the element count limit
    #[arg(long)]
    pub max_nodes: Option<usize>,
}

#[derive(Debug, Clone, clap::Args)]
pub struct JsonToXmlArgs {
    #[clap(flatten)]
    pub io: Io,

    /// Document element used when the JSON has no single root key
    #[arg(long, default_value = "root")]
    pub root_tag: String,

    /// Write the document on a single line
    #[arg(long)]
    pub compact: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct HtmlTableToJsonArgs {
    #[clap(flatten)]
    pub io: Io,

    /// Zero-based index of the table
    #[arg(long, default_value = "0")]
    pub table_index: usize,

    /// The first row is data, not column names
    #[arg(long)]
    pub no_header: bool,

    /// Emit numeric cells as JSON numbers
    #[arg(long)]
    pub convert_numbers: bool,
}

#[derive(Debug, Clone, clap::Args)]
pub struct CsvUrlToJsonArgs {
    /// URL of the CSV file (http or https)
    pub url: String,

    /// Write the result to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[clap(flatten)]
    pub dialect: Dialect,

    /// Indent the JSON output
    #[arg(long)]
    pub pretty: bool,

    #[clap(flatten)]
    pub fetch: FetchOptions,
}

#[derive(Debug, Clone, clap::Args)]
pub struct TextCleanArgs {
    #[clap(flatten)]
    pub io: Io,

    #[arg(long)]
    pub no_trim: bool,

    #[arg(long)]
    pub no_normalize_unicode: bool,

    #[arg(long)]
    pub no_remove_accents: bool,

    #[arg(long)]
    pub no_collapse_whitespace: bool,

    #[arg(long)]
    pub no_lower: bool,

    /// Characters kept from the input (0 keeps everything)
    #[arg(long, default_value_t = DEFAULT_MAX_LENGTH)]
    pub max_length: usize,

    /// Print `{text, original_length, cleaned_length}` as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(app: App, global: crate::Global) -> Result<()> {
    let limits = Limits::from(&app.limits);

    match app.command {
        Commands::CsvToJson(args) => {
            let options = CsvToJsonOptions {
                delimiter: args.dialect.delimiter,
                encoding: args.dialect.encoding,
                has_header: !args.dialect.no_header,
                pretty: args.pretty,
            };
            let conversion = csv_to_json(&read_input(&args.io.input)?, &options, &limits)?;
            emit(conversion, args.io.output.as_deref(), &global)
        }
        Commands::JsonToCsv(args) => {
            let options = JsonToCsvOptions {
                delimiter: args.delimiter,
                has_header: !args.no_header,
            };
            let input = read_input(&args.io.input)?;
            let conversion = json_to_csv(&decode_utf8(&input)?, &options, &limits)?;
            emit(conversion, args.io.output.as_deref(), &global)
        }
        Commands::CsvToExcel(args) => {
            let options = CsvToExcelOptions {
                delimiter: args.dialect.delimiter,
                encoding: args.dialect.encoding,
                has_header: !args.dialect.no_header,
                sheet_name: args.sheet_name,
            };
            let conversion = csv_to_excel(&read_input(&args.io.input)?, &options, &limits)?;
            emit(conversion, args.io.output.as_deref(), &global)
        }
        Commands::ExcelToCsv(args) => {
            let options = ExcelToCsvOptions {
                delimiter: args.dialect.delimiter,
                encoding: args.dialect.encoding,
                has_header: !args.dialect.no_header,
                sheet_name: args.sheet_name,
            };
            let conversion = excel_to_csv(&read_input(&args.io.input)?, &options, &limits)?;
            emit(conversion, args.io.output.as_deref(), &global)
        }
        Commands::JsonFormat(args) => {
            let options = FormatOptions {
                mode: if args.compact {
                    FormatMode::Compact
                } else {
                    FormatMode::Pretty
                },
                validate: !args.no_validate,
                indent: args.indent,
                sort_keys: args.sort_keys,
                ensure_ascii: args.ensure_ascii,
            };
            let input = read_input(&args.io.input)?;
            let formatted = format_json(&decode_utf8(&input)?, &options, &limits)?;
            write_output(args.io.output.as_deref(), formatted.as_bytes())
        }
        Commands::XmlToJson(args) => {
            let options = XmlToJsonOptions {
                pretty: args.pretty,
                max_depth: args.max_depth,
                max_nodes: args.max_nodes,
            };
            let input = read_input(&args.io.input)?;
            let json = xml_to_json(&decode_utf8(&input)?, &options, &limits)?;
            write_output(args.io.output.as_deref(), json.as_bytes())
        }
        Commands::JsonToXml(args) => {
            let options = JsonToXmlOptions {
                root_tag: args.root_tag,
                pretty: !args.compact,
            };
            let input = read_input(&args.io.input)?;
            let xml = json_to_xml(&decode_utf8(&input)?, &options, &limits)?;
            write_output(args.io.output.as_deref(), xml.as_bytes())
        }
        Commands::HtmlTableToJson(args) => {
            let options = HtmlTableOptions {
                table_index: args.table_index,
                has_header: !args.no_header,
                convert_numbers: args.convert_numbers,
            };
            let input = read_input(&args.io.input)?;
            let conversion = html_table_to_json(&decode_utf8(&input)?, &options, &limits)?;
            emit(conversion, args.io.output.as_deref(), &global)
        }
        Commands::CsvUrlToJson(args) => {
            let options = CsvToJsonOptions {
                delimiter: args.dialect.delimiter,
                encoding: args.dialect.encoding,
                has_header: !args.dialect.no_header,
                pretty: args.pretty,
            };
            let config = FetchConfig::try_from(&args.fetch)?;
            let client = crate::fetch::build_client(&config)?;
            if global.verbose {
                eprintln!("Fetching {}...", args.url);
            }
            let bytes = crate::fetch::fetch_bytes(&client, &args.url, &config).await?;
            let conversion = csv_to_json(&bytes, &options, &limits)?;
            emit(conversion, args.output.as_deref(), &global)
        }
        Commands::TextClean(args) => {
            let options = CleanOptions {
                trim: !args.no_trim,
                normalize_unicode: !args.no_normalize_unicode,
                remove_accents: !args.no_remove_accents,
                collapse_whitespace: !args.no_collapse_whitespace,
                to_lower: !args.no_lower,
                max_length: args.max_length,
            };
            let input = read_input(&args.io.input)?;
            let cleaned = clean_text(&decode_utf8(&input)?, &options);
            if args.json {
                let json = serde_json::to_string_pretty(&cleaned)?;
                write_output(args.io.output.as_deref(), json.as_bytes())
            } else {
                if global.verbose {
                    eprintln!(
                        "{} -> {} characters",
                        cleaned.original_length, cleaned.cleaned_length
                    );
                }
                write_output(args.io.output.as_deref(), cleaned.text.as_bytes())
            }
        }
    }
}

fn read_input(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| f!("Failed to read {}", path.display()))
}

fn write_output(output: Option<&Path>, bytes: &[u8]) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, bytes).with_context(|| f!("Failed to write {}", path.display()))
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(bytes).context("Failed to write to stdout")?;
            if !bytes.ends_with(b"\n") && std::str::from_utf8(bytes).is_ok() {
                stdout.write_all(b"\n").context("Failed to write to stdout")?;
            }
            Ok(())
        }
    }
}

fn emit<T: AsRef<[u8]>>(conversion: Conversion<T>, output: Option<&Path>, global: &crate::Global) -> Result<()> {
    if let Some(warning) = &conversion.warning {
        eprintln!("Warning: {warning}");
    }
    if global.verbose {
        eprintln!("Converted {} rows", conversion.rows);
    }
    write_output(output, conversion.output.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn global() -> crate::Global {
        crate::Global { verbose: false }
    }

    async fn convert(args: &[&str]) -> Result<()> {
        let app = App::parse_from(std::iter::once("convert").chain(args.iter().copied()));
        run(app, global()).await
    }

    #[tokio::test]
    async fn test_csv_to_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("people.csv");
        let output = dir.path().join("people.json");
        std::fs::write(&input, "name;age\nAda;36\n").unwrap();

        convert(&[
            "csv-to-json",
            input.to_str().unwrap(),
            "--delimiter",
            ";",
            "--output",
            output.to_str().unwrap(),
        ])
        .await
        .unwrap();

        assert_eq!(
            std::fs::read_to_string(&output).unwrap(),
            r#"[{"name":"Ada","age":"36"}]"#
        );
    }

    #[tokio::test]
    async fn test_csv_excel_csv_files() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("in.csv");
        let xlsx = dir.path().join("out.xlsx");
        let back = dir.path().join("back.csv");
        std::fs::write(&csv, "a,b\n1,x\n").unwrap();

        convert(&["csv-to-excel", csv.to_str().unwrap(), "-o", xlsx.to_str().unwrap()])
            .await
            .unwrap();
        convert(&["excel-to-csv", xlsx.to_str().unwrap(), "-o", back.to_str().unwrap()])
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&back).unwrap(), "a,b\n1,x\n");
    }

    #[tokio::test]
    async fn test_json_to_xml_compact_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.json");
        let output = dir.path().join("out.xml");
        std::fs::write(&input, r#"[1,2]"#).unwrap();

        convert(&[
            "json-to-xml",
            input.to_str().unwrap(),
            "--root-tag",
            "numbers",
            "--compact",
            "-o",
            output.to_str().unwrap(),
        ])
        .await
        .unwrap();

        assert!(std::fs::read_to_string(&output)
            .unwrap()
            .ends_with("<numbers><item>1</item><item>2</item></numbers>"));
    }

    #[tokio::test]
    async fn test_global_limits_apply() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("deep.xml");
        std::fs::write(&input, "<a><b><c/></b></a>").unwrap();

        let err = convert(&["--xml-max-depth", "2", "xml-to-json", input.to_str().unwrap()])
            .await
            .unwrap_err();
        let convert_err = err.downcast_ref::<convertkit_core::ConvertError>().unwrap();
        assert_eq!(convert_err.kind(), "depth_limit");
    }

    #[tokio::test]
    async fn test_text_clean_json_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.json");
        std::fs::write(&input, "  Héllo   Wôrld \n").unwrap();

        convert(&[
            "text-clean",
            input.to_str().unwrap(),
            "--json",
            "-o",
            output.to_str().unwrap(),
        ])
        .await
        .unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value["text"], "hello world");
        assert_eq!(value["original_length"], 17);
    }

    #[tokio::test]
    async fn test_missing_input_file() {
        let err = convert(&["json-format", "/definitely/not/here.json"]).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
