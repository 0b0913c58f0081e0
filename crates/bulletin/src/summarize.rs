use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tokio::runtime::Runtime;

use crate::config::BulletinConfig;
use crate::logging;

const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

/// Built-in guided template used when no instructions file is given. The
/// labeled sections are what the reducer merges across chunks.
const DEFAULT_INSTRUCTIONS: &str = "Please provide a comprehensive summary of the attached \
document with all the following sections, and all of them should be filled in with \
corresponding information:\n\
1) Summary: a 2-3 sentence, brief summary of the document.\n\
2) Publication Date: the date the document was published.\n\
3) Effective Date: when the described requirements take effect.\n\
4) Key Details: the requirements stated by the document and what is needed to comply.\n\
5) Action Items: concrete follow-ups the reader must take.";

pub fn run(input: String, instructions: Option<String>) -> Result<()> {
    let config = BulletinConfig::from_env()?;
    let tokenizer = config.tokenizer.build()?;
    let content = read_plain_text(Path::new(&input))?;
    let instructions = match instructions {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read instructions file {path}"))?,
        None => DEFAULT_INSTRUCTIONS.to_string(),
    };
    let prompt = format!(
        "{instructions}\n\nUser Input:\nPlease provide a summary based on the above \
         considerations and the attached file content.\n\nAttached File Content:\n{content}"
    );
    logging::stage(
        "summarize",
        format!("summarizing {input} ({} bytes)", content.len()),
    );
    logging::verbose(format!("prompt: {} chars of instructions", instructions.len()));
    let client = config.client();
    let mut session = config.session();
    let runtime = Runtime::new().context("failed to start tokio runtime")?;
    let reply = runtime.block_on(session.answer(&client, &tokenizer, &prompt, None))?;
    println!("{reply}");
    Ok(())
}

fn read_plain_text(path: &Path) -> Result<String> {
    let metadata = fs::metadata(path)
        .with_context(|| format!("failed to stat {}", path.display()))?;
    if metadata.len() > MAX_FILE_SIZE {
        return Err(anyhow!(format!(
            "file {} exceeds the {} MB limit",
            path.display(),
            MAX_FILE_SIZE / (1024 * 1024)
        )));
    }
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
