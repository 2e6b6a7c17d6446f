use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use bookcore::{
    ArtifactKind, BookCoordinator, BookOpenOptions, CancelHandle, FrameConfig, ImageLoader, LoadTarget,
    PageKind, PageLocator, PhysicalPage, PreloadConfig, PreloadError, ThumbnailLoader,
};
use bytes::Bytes;

#[derive(Clone, Debug)]
enum Json {
    Num(usize),
    Str(String),
    Arr(Vec<Json>),
    Obj(Vec<(String, Json)>),
}

impl Json {
    fn render(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out, 0);
        out
    }

    fn write_into(&self, out: &mut String, depth: usize) {
        match self {
            Json::Num(v) => out.push_str(&v.to_string()),
            Json::Str(v) => write_json_string(out, v),
            Json::Arr(items) => {
                out.push('[');
                if !items.is_empty() {
                    out.push('\n');
                }
                for (idx, item) in items.iter().enumerate() {
                    write_indent(out, depth + 1);
                    item.write_into(out, depth + 1);
                    if idx + 1 != items.len() {
                        out.push(',');
                    }
                    out.push('\n');
                }
                if !items.is_empty() {
                    write_indent(out, depth);
                }
                out.push(']');
            }
            Json::Obj(fields) => {
                out.push('{');
                if !fields.is_empty() {
                    out.push('\n');
                }
                for (idx, (key, value)) in fields.iter().enumerate() {
                    write_indent(out, depth + 1);
                    write_json_string(out, key);
                    out.push_str(": ");
                    value.write_into(out, depth + 1);
                    if idx + 1 != fields.len() {
                        out.push(',');
                    }
                    out.push('\n');
                }
                if !fields.is_empty() {
                    write_indent(out, depth);
                }
                out.push('}');
            }
        }
    }
}

fn write_indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_json_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Reads full file bytes straight off disk; stands in for a real decoder.
struct FileImageLoader;

#[async_trait]
impl ImageLoader for FileImageLoader {
    async fn load(&self, target: &LoadTarget, cancel: CancelHandle) -> Result<Bytes, PreloadError> {
        if cancel.is_cancelled() {
            return Err(PreloadError::Cancelled);
        }
        let PageLocator::Path(path) = &target.locator else {
            return Err(PreloadError::Loader("expected a path locator".into()));
        };
        tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|e| PreloadError::Loader(e.to_string()))
    }
}

/// Truncates the full image to a fixed prefix; stands in for a real resize.
struct PrefixThumbnailLoader {
    max_bytes: usize,
}

#[async_trait]
impl ThumbnailLoader for PrefixThumbnailLoader {
    async fn load(&self, target: &LoadTarget, cancel: CancelHandle) -> Result<Bytes, PreloadError> {
        if cancel.is_cancelled() {
            return Err(PreloadError::Cancelled);
        }
        let PageLocator::Path(path) = &target.locator else {
            return Err(PreloadError::Loader("expected a path locator".into()));
        };
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| PreloadError::Loader(e.to_string()))?;
        Ok(Bytes::from(bytes[..bytes.len().min(self.max_bytes)].to_vec()))
    }
}

fn scan_folder(dir: &PathBuf) -> Result<Vec<PhysicalPage>, String> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .map_err(|e| e.to_string())?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_file())
        .collect();
    entries.sort_by_key(|e| e.file_name());

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let path = entry.path();
            let meta = entry.metadata().ok();
            PhysicalPage {
                index,
                name: entry.file_name().to_string_lossy().into_owned(),
                locator: PageLocator::Path(path),
                width: 0,
                height: 0,
                modified: meta.as_ref().and_then(|m| m.modified().ok()),
                file_size: meta.map(|m| m.len()).unwrap_or(0),
                kind: PageKind::Image,
                tombstone: false,
            }
        })
        .collect())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(env::args().collect()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Vec<String>) -> Result<(), String> {
    let rest: Vec<String> = args.into_iter().skip(1).collect();
    if rest.is_empty() || rest[0] == "--help" || rest[0] == "-h" {
        print_help();
        return Ok(());
    }

    let folder = PathBuf::from(&rest[0]);
    let pages = scan_folder(&folder)?;
    let page_count = pages.len();

    let coordinator = BookCoordinator::new(FrameConfig::default(), PreloadConfig::default());
    coordinator.set_image_loader(Arc::new(FileImageLoader));
    coordinator.set_thumbnail_loader(Arc::new(PrefixThumbnailLoader { max_bytes: 4096 }));
    coordinator.open(
        folder.to_string_lossy().into_owned(),
        pages,
        BookOpenOptions::default(),
    );

    let mut steps = Vec::new();
    loop {
        let Some(frame) = coordinator.current_frame() else {
            break;
        };
        let mut sizes = Vec::new();
        for element in &frame.elements {
            let bytes = coordinator
                .request_artifact(ArtifactKind::Image, element.virtual_index)
                .await
                .map_err(|e| e.to_string())?;
            sizes.push(Json::Obj(vec![
                ("virtual_index".to_string(), Json::Num(element.virtual_index)),
                ("bytes".to_string(), Json::Num(bytes.len())),
            ]));
        }
        steps.push(Json::Obj(vec![
            ("position".to_string(), Json::Num(coordinator.position().index.max(0) as usize)),
            ("elements".to_string(), Json::Arr(sizes)),
        ]));

        if coordinator.next_frame().is_none() {
            break;
        }
    }

    let output = Json::Obj(vec![
        ("folder".to_string(), Json::Str(folder.to_string_lossy().into_owned())),
        ("physical_pages".to_string(), Json::Num(page_count)),
        ("steps".to_string(), Json::Arr(steps)),
    ]);
    println!("{}", output.render());

    coordinator.close().await;
    Ok(())
}

fn print_help() {
    let help = r#"bookcore-demo - walk a folder of images as a book

USAGE:
  bookcore-demo <folder>

Prints, as JSON, the sequence of frames the coordinator produces while
walking the folder front-to-back, loading each element's full image
through the preload pipeline.
"#;
    println!("{}", help);
}
