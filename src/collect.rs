use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "flac", "ogg", "opus", "wma", "aac", "wav", "aiff", "aif",
];

pub fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(OsStr::to_str)
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_hidden(name: &OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// Turn dropped paths into track references, in drop order.
///
/// Files are taken as given, whatever their extension; anything wrong with
/// them is reported when they are organized. Directories contribute the
/// audio files inside them, sorted, descending into subdirectories only
/// when `recursive` is set.
pub fn collect_tracks(inputs: &[PathBuf], recursive: bool) -> Result<Vec<PathBuf>> {
    let mut tracks = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let found = scan_dir(input, recursive)?;
            debug!("{}: {} audio files", input.display(), found.len());
            tracks.extend(found);
        } else {
            tracks.push(input.clone());
        }
    }

    Ok(tracks)
}

fn scan_dir(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in WalkDir::new(dir)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()))
        {
            let entry =
                entry.with_context(|| format!("Failed to walk directory: {}", dir.display()))?;
            if entry.file_type().is_file() && is_audio_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
    } else {
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.is_file() && is_audio_file(&path) && !is_hidden(&entry.file_name()) {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn audio_extension_check_ignores_case() {
        assert!(is_audio_file(Path::new("a.MP3")));
        assert!(is_audio_file(Path::new("dir/b.flac")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("no_extension")));
    }

    #[test]
    fn explicit_files_keep_drop_order() {
        let inputs = vec![
            PathBuf::from("/drop/z.mp3"),
            PathBuf::from("/drop/a.txt"),
            PathBuf::from("/drop/m.flac"),
        ];
        assert_eq!(collect_tracks(&inputs, false).unwrap(), inputs);
    }

    #[test]
    fn directories_expand_to_sorted_audio_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::write(dir.join("b.mp3"), "").unwrap();
        fs::write(dir.join("a.flac"), "").unwrap();
        fs::write(dir.join("cover.jpg"), "").unwrap();
        fs::write(dir.join(".hidden.mp3"), "").unwrap();
        fs::create_dir(dir.join("sub")).unwrap();
        fs::write(dir.join("sub/c.mp3"), "").unwrap();

        let flat = collect_tracks(&[dir.to_path_buf()], false).unwrap();
        assert_eq!(flat, vec![dir.join("a.flac"), dir.join("b.mp3")]);

        let deep = collect_tracks(&[dir.to_path_buf()], true).unwrap();
        assert_eq!(
            deep,
            vec![dir.join("a.flac"), dir.join("b.mp3"), dir.join("sub/c.mp3")]
        );
    }

    #[test]
    fn recursive_scan_skips_hidden_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path();
        fs::create_dir(dir.join(".trash")).unwrap();
        fs::write(dir.join(".trash/old.mp3"), "").unwrap();
        fs::write(dir.join("new.mp3"), "").unwrap();

        let found = collect_tracks(&[dir.to_path_buf()], true).unwrap();
        assert_eq!(found, vec![dir.join("new.mp3")]);
    }

    #[test]
    fn mixed_inputs_preserve_order_between_items() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("album");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("01.mp3"), "").unwrap();
        let single = tmp.path().join("single.mp3");
        fs::write(&single, "").unwrap();

        let found = collect_tracks(&[single.clone(), dir.clone()], false).unwrap();
        assert_eq!(found, vec![single, dir.join("01.mp3")]);
    }
}
