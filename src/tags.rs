use lofty::error::LoftyError;
use lofty::prelude::*;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use std::fmt;
use std::path::{Path, PathBuf};

/// Read-only view of the tag fields the organizer cares about.
///
/// Every field is an empty string when the tag does not carry it or carries
/// only whitespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSnapshot {
    pub artist: String,
    pub album_artist: String,
    pub album: String,
    pub title: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// The file could not be opened at all.
    #[error("cannot open {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: LoftyError,
    },
    /// Not a container lofty understands, or a corrupt one.
    #[error("unreadable audio container in {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: LoftyError,
    },
    /// The container was parsed but holds no tag.
    #[error("no tag header in {}", path.display())]
    NoTagHeader { path: PathBuf },
}

pub fn read_tags(path: &Path) -> Result<TagSnapshot, TagError> {
    // Sniff the content as well: dropped files may lack or lie about their extension.
    let tagged_file = Probe::open(path)
        .and_then(|probe| probe.guess_file_type().map_err(LoftyError::from))
        .map_err(|source| TagError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .read()
        .map_err(|source| TagError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

    let tag = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
        .ok_or_else(|| TagError::NoTagHeader {
            path: path.to_path_buf(),
        })?;

    Ok(snapshot_of(tag))
}

fn snapshot_of(tag: &Tag) -> TagSnapshot {
    TagSnapshot {
        artist: non_blank(tag.artist().as_deref()),
        album_artist: non_blank(tag.get_string(&ItemKey::AlbumArtist)),
        album: non_blank(tag.album().as_deref()),
        title: non_blank(tag.title().as_deref()),
    }
}

fn non_blank(value: Option<&str>) -> String {
    value.map(str::trim).unwrap_or_default().to_string()
}

impl fmt::Display for TagSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rows = [
            ("Artist", &self.artist),
            ("Album artist", &self.album_artist),
            ("Album", &self.album),
            ("Title", &self.title),
        ];
        for (label, value) in rows {
            let value = if value.is_empty() { "-" } else { value.as_str() };
            writeln!(f, "{:<14}{}", format!("{}:", label), value)?;
        }
        Ok(())
    }
}

/// Audio fixtures generated on the fly for tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use lofty::config::WriteOptions;
    use lofty::prelude::*;
    use lofty::tag::{ItemKey, Tag, TagType};
    use std::fs;
    use std::path::Path;

    /// Write a tiny mono 16-bit PCM WAV file with no tags.
    pub fn write_wav(path: &Path) {
        let samples = vec![0u8; 1600];
        let mut bytes = Vec::with_capacity(44 + samples.len());
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + samples.len() as u32).to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&1u16.to_le_bytes()); // channels
        bytes.extend_from_slice(&8000u32.to_le_bytes()); // sample rate
        bytes.extend_from_slice(&16000u32.to_le_bytes()); // byte rate
        bytes.extend_from_slice(&2u16.to_le_bytes()); // block align
        bytes.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(samples.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&samples);
        fs::write(path, bytes).unwrap();
    }

    /// Write a WAV file carrying an ID3v2 tag with the given fields.
    pub fn write_tagged_wav(
        path: &Path,
        artist: Option<&str>,
        album_artist: Option<&str>,
        album: Option<&str>,
        title: Option<&str>,
    ) {
        write_wav(path);

        let mut tag = Tag::new(TagType::Id3v2);
        if let Some(artist) = artist {
            tag.set_artist(artist.to_string());
        }
        if let Some(album_artist) = album_artist {
            tag.insert_text(ItemKey::AlbumArtist, album_artist.to_string());
        }
        if let Some(album) = album {
            tag.set_album(album.to_string());
        }
        if let Some(title) = title {
            tag.set_title(title.to_string());
        }
        tag.save_to_path(path, WriteOptions::default()).unwrap();
    }

    pub fn write_artist_wav(path: &Path, artist: &str) {
        write_tagged_wav(path, Some(artist), None, None, Some("Untitled"));
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use std::fs;

    #[test]
    fn reads_all_snapshot_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("roygbiv.wav");
        write_tagged_wav(
            &path,
            Some("Boards of Canada"),
            Some("Boards of Canada"),
            Some("Music Has the Right to Children"),
            Some("Roygbiv"),
        );

        let snapshot = read_tags(&path).unwrap();
        assert_eq!(snapshot.artist, "Boards of Canada");
        assert_eq!(snapshot.album_artist, "Boards of Canada");
        assert_eq!(snapshot.album, "Music Has the Right to Children");
        assert_eq!(snapshot.title, "Roygbiv");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("title-only.wav");
        write_tagged_wav(&path, None, None, None, Some("Only a title"));

        let snapshot = read_tags(&path).unwrap();
        assert_eq!(snapshot.artist, "");
        assert_eq!(snapshot.album_artist, "");
        assert_eq!(snapshot.album, "");
        assert_eq!(snapshot.title, "Only a title");
    }

    #[test]
    fn untagged_file_has_no_tag_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bare.wav");
        write_wav(&path);

        assert!(matches!(
            read_tags(&path),
            Err(TagError::NoTagHeader { .. })
        ));
    }

    #[test]
    fn content_decides_format_not_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let tagged = tmp.path().join("plaid.wav");
        write_artist_wav(&tagged, "Plaid");

        let bare = tmp.path().join("dropped");
        fs::rename(&tagged, &bare).unwrap();
        assert_eq!(read_tags(&bare).unwrap().artist, "Plaid");

        let mislabelled = tmp.path().join("dropped.flac");
        fs::rename(&bare, &mislabelled).unwrap();
        assert_eq!(read_tags(&mislabelled).unwrap().artist, "Plaid");
    }

    #[test]
    fn unknown_container_is_unreadable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("notes.txt");
        fs::write(&path, "definitely not audio").unwrap();

        assert!(matches!(
            read_tags(&path),
            Err(TagError::Unreadable { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gone.mp3");

        assert!(matches!(read_tags(&path), Err(TagError::Io { .. })));
    }

    #[test]
    fn display_marks_empty_fields() {
        let snapshot = TagSnapshot {
            artist: "Autechre".to_string(),
            ..Default::default()
        };
        let rendered = snapshot.to_string();
        assert!(rendered.contains("Artist:       Autechre"));
        assert!(rendered.contains("Album:        -"));
    }
}
