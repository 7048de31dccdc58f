use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Largest payload a frame may carry. Events hold two bounded names, an id and
/// two timestamps, so anything near this size is a corrupt length word.
pub const MAX_FRAME_LEN: u32 = 64 * 1024;

/// Bytes of framing around each payload: length word plus checksum.
const FRAME_OVERHEAD: u64 = 8;

fn encode(event: &Event) -> io::Result<Vec<u8>> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_FRAME_LEN as usize {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("event of {} bytes exceeds frame limit", payload.len()),
        ));
    }
    Ok(payload)
}

fn write_frame(writer: &mut impl Write, payload: &[u8]) -> io::Result<()> {
    writer.write_all(&(payload.len() as u32).to_le_bytes())?;
    writer.write_all(payload)?;
    writer.write_all(&crc32fast::hash(payload).to_le_bytes())
}

/// Fill `buf`; a short read at EOF is `Ok(false)`.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Decode the next frame, returning the event and its on-disk size. `None`
/// marks the end of the usable log: EOF, a torn tail, an oversized length,
/// a checksum mismatch, or an undecodable payload.
fn read_frame(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut word = [0u8; 4];
    if !read_full(reader, &mut word)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(word);
    if len > MAX_FRAME_LEN {
        return Ok(None);
    }
    let mut payload = vec![0u8; len as usize];
    if !read_full(reader, &mut payload)? || !read_full(reader, &mut word)? {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    Ok(bincode::deserialize(&payload)
        .ok()
        .map(|event| (event, u64::from(len) + FRAME_OVERHEAD)))
}

/// What a scan of the log found.
#[derive(Debug, Default)]
pub struct Replay {
    pub events: Vec<Event>,
    /// Length of the valid prefix in bytes.
    pub valid_len: u64,
    /// Bytes after the valid prefix that could not be decoded.
    pub discarded: u64,
}

/// Append-only write-ahead log of alias events.
///
/// Entries are `[u32 len][bincode Event][u32 crc32]`. Reading stops at the
/// first entry that fails to decode; [`Wal::recover`] cuts the file there so
/// later appends are never hidden behind garbage.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
}

impl Wal {
    /// Scan the log at `path` without modifying it. A missing file is empty.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let total = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        while let Some((event, size)) = read_frame(&mut reader)? {
            replay.events.push(event);
            replay.valid_len += size;
        }
        replay.discarded = total - replay.valid_len;
        Ok(replay)
    }

    /// Replay the log, truncate any undecodable tail, and open it for appends.
    pub fn recover(path: &Path) -> io::Result<(Self, Replay)> {
        let replay = Self::replay(path)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;
        if replay.discarded > 0 {
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        file.seek(SeekFrom::End(0))?;
        let wal = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
        };
        Ok((wal, replay))
    }

    /// Buffer one event. Durable only after [`Wal::sync`].
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        write_frame(&mut self.writer, &encode(event)?)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replace the whole log with `events`. The new content is written and
    /// synced beside the log, then renamed over it.
    pub fn rewrite(&mut self, events: &[Event]) -> io::Result<()> {
        self.sync()?;
        let staging = self.path.with_extension("wal.tmp");
        {
            let mut writer = BufWriter::new(File::create(&staging)?);
            for event in events {
                write_frame(&mut writer, &encode(event)?)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&staging, &self.path)?;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    fn fresh_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("tempalias_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn created(alias: &str, start: i64, end: Option<i64>) -> Event {
        Event::AliasCreated {
            id: Ulid::new(),
            alias: alias.into(),
            target: "T".into(),
            start,
            end,
        }
    }

    fn write_log(path: &Path, events: &[Event]) {
        let (mut wal, _) = Wal::recover(path).unwrap();
        for e in events {
            wal.append(e).unwrap();
        }
        wal.sync().unwrap();
    }

    fn push_raw(path: &Path, bytes: &[u8]) {
        let mut f = OpenOptions::new().append(true).open(path).unwrap();
        f.write_all(bytes).unwrap();
    }

    #[test]
    fn events_come_back_in_order() {
        let path = fresh_path("order.wal");
        let first = created("a", 1000, None);
        let Event::AliasCreated { id, .. } = first else { unreachable!() };
        let events = vec![first.clone(), Event::EndChanged { id, end: Some(2000) }];
        write_log(&path, &events);

        let replay = Wal::replay(&path).unwrap();
        assert_eq!(replay.events, events);
        assert_eq!(replay.discarded, 0);
        assert_eq!(replay.valid_len, fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn missing_file_is_empty() {
        let path = fresh_path("missing.wal");
        let replay = Wal::replay(&path).unwrap();
        assert!(replay.events.is_empty());
        assert_eq!(replay.valid_len, 0);
    }

    #[test]
    fn unsynced_appends_are_not_visible() {
        let path = fresh_path("unsynced.wal");
        let (mut wal, _) = Wal::recover(&path).unwrap();
        wal.append(&created("a", 0, None)).unwrap();
        assert_eq!(wal.appends_since_compact(), 1);
        assert!(Wal::replay(&path).unwrap().events.is_empty());
        wal.sync().unwrap();
        assert_eq!(Wal::replay(&path).unwrap().events.len(), 1);
    }

    #[test]
    fn torn_tail_is_cut_on_recover() {
        let path = fresh_path("torn.wal");
        let kept = created("a", 1000, Some(2000));
        write_log(&path, std::slice::from_ref(&kept));
        push_raw(&path, &[7u8; 6]);

        let replay = Wal::replay(&path).unwrap();
        assert_eq!(replay.events, vec![kept.clone()]);
        assert_eq!(replay.discarded, 6);

        // Without the cut, this append would sit behind the garbage.
        let later = created("b", 2000, None);
        write_log(&path, std::slice::from_ref(&later));
        assert_eq!(Wal::replay(&path).unwrap().events, vec![kept, later]);
    }

    #[test]
    fn checksum_mismatch_ends_the_log() {
        let path = fresh_path("crc.wal");
        let kept = created("a", 0, None);
        write_log(&path, std::slice::from_ref(&kept));

        let payload = bincode::serialize(&created("b", 5, None)).unwrap();
        let mut frame = (payload.len() as u32).to_le_bytes().to_vec();
        frame.extend_from_slice(&payload);
        frame.extend_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        push_raw(&path, &frame);

        let replay = Wal::replay(&path).unwrap();
        assert_eq!(replay.events, vec![kept]);
        assert_eq!(replay.discarded, frame.len() as u64);
    }

    #[test]
    fn oversized_length_word_is_corruption() {
        let path = fresh_path("oversized.wal");
        let kept = created("a", 0, None);
        write_log(&path, std::slice::from_ref(&kept));
        push_raw(&path, &u32::MAX.to_le_bytes());
        push_raw(&path, &[0u8; 16]);

        let (_, replay) = Wal::recover(&path).unwrap();
        assert_eq!(replay.events, vec![kept]);
        assert_eq!(fs::metadata(&path).unwrap().len(), replay.valid_len);
    }

    #[test]
    fn oversized_event_is_refused() {
        let path = fresh_path("refused.wal");
        let (mut wal, _) = Wal::recover(&path).unwrap();
        let huge = created(&"x".repeat(MAX_FRAME_LEN as usize), 0, None);
        let err = wal.append(&huge).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert_eq!(wal.appends_since_compact(), 0);
    }

    #[test]
    fn rewrite_replaces_content_and_keeps_appending() {
        let path = fresh_path("rewrite.wal");
        let live = created("kept", 0, None);
        let Event::AliasCreated { id, .. } = live else { unreachable!() };

        let (mut wal, _) = Wal::recover(&path).unwrap();
        wal.append(&live).unwrap();
        for i in 1..=20 {
            wal.append(&Event::EndChanged { id, end: Some(i * 100) }).unwrap();
        }
        wal.append(&Event::EndChanged { id, end: None }).unwrap();
        wal.sync().unwrap();
        let before = fs::metadata(&path).unwrap().len();

        wal.rewrite(std::slice::from_ref(&live)).unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "rewritten log should shrink: {after} < {before}");

        let next = created("next", 10, None);
        wal.append(&next).unwrap();
        wal.sync().unwrap();
        assert_eq!(Wal::replay(&path).unwrap().events, vec![live, next]);
        assert!(!path.with_extension("wal.tmp").exists());
    }
}
