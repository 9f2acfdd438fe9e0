//! Draft loading.
//!
//! A draft source is a JSON file holding one draft or an array of drafts, or
//! a directory of such files (read in file-name order).

use std::path::Path;

use anyhow::{Context, Result};
use draftfix_core::ArticleDraft;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum DraftFile {
    Many(Vec<ArticleDraft>),
    One(ArticleDraft),
}

pub fn load_drafts(path: &Path) -> Result<Vec<ArticleDraft>> {
    if !path.is_dir() {
        return load_file(path);
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)
        .with_context(|| format!("Failed to read draft directory {}", path.display()))?
    {
        let p = entry?.path();
        if p.extension().is_some_and(|ext| ext == "json") {
            files.push(p);
        }
    }
    files.sort();

    let mut drafts = Vec::new();
    for file in files {
        drafts.extend(load_file(&file)?);
    }
    Ok(drafts)
}

fn load_file(path: &Path) -> Result<Vec<ArticleDraft>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed: DraftFile = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse drafts in {}", path.display()))?;
    Ok(match parsed {
        DraftFile::Many(drafts) => drafts,
        DraftFile::One(draft) => vec![draft],
    })
}
