//! Per-viewer catalog assembly.
//!
//! Merges the built-in samples, the viewer's uploads and the viewer's liked
//! songs into one list without duplicates, annotated with `is_liked` and
//! `can_delete` for that viewer.

use std::collections::HashSet;

use crate::models::song::Song;

/// What the storage layer knows about one viewer.
#[derive(Debug, Default)]
pub struct ViewerLibrary {
    /// Songs the viewer uploaded, in upload order.
    pub uploads: Vec<Song>,
    /// Stored songs the viewer has liked, in like order.
    pub liked: Vec<Song>,
}

/// Build the visible song list.
///
/// Output order is samples, then uploads, then liked songs not already
/// present. On identifier collision the entry seen first is kept untouched.
pub fn aggregate(samples: &[Song], viewer: Option<ViewerLibrary>) -> Vec<Song> {
    let mut songs: Vec<Song> = samples
        .iter()
        .cloned()
        .map(|mut song| {
            song.is_liked = false;
            song.can_delete = false;
            song
        })
        .collect();

    let Some(library) = viewer else {
        return songs;
    };

    let mut present: HashSet<String> = songs.iter().map(|s| s.id.clone()).collect();

    for mut upload in library.uploads {
        if present.insert(upload.id.clone()) {
            upload.is_liked = false;
            upload.can_delete = true;
            songs.push(upload);
        }
    }

    let liked_ids: HashSet<String> = library.liked.iter().map(|s| s.id.clone()).collect();

    // Uploads only ever appear through their owner's upload list.
    for mut liked in library.liked {
        if liked.is_uploaded || present.contains(&liked.id) {
            continue;
        }
        present.insert(liked.id.clone());
        liked.can_delete = false;
        songs.push(liked);
    }

    for song in songs.iter_mut() {
        song.is_liked = liked_ids.contains(&song.id);
    }

    songs
}
