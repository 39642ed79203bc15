/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    OTFAD image assembly: header and encrypted regions concatenated in slot
    order, with the key blobs spliced over the start of the image.

--*/

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::info;
use otfad_image_exec::fs;
use otfad_image_types::*;

/// Image Bundle Writer
pub struct ImageBundleWriter<W: Write + Seek> {
    writer: W,
    path: PathBuf,
    len: u64,
}

impl<W: Write + Seek> ImageBundleWriter<W> {
    /// Create an instance of `ImageBundleWriter`. `path` names the
    /// destination in error messages.
    pub fn new(writer: W, path: impl Into<PathBuf>) -> Self {
        Self {
            writer,
            path: path.into(),
            len: 0,
        }
    }

    /// Append a header or encrypted region section
    pub fn append<R: Read>(&mut self, section: &mut R) -> OtfadResult<u64> {
        let written = std::io::copy(section, &mut self.writer)
            .map_err(|err| OtfadError::io("appending section to", &self.path, err))?;
        self.len += written;
        Ok(written)
    }

    /// Bytes appended so far
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Overwrite the first [`KEY_BLOB_REGION_BYTE_SIZE`] bytes with the
    /// concatenated key blobs, zero padded. The image length is unchanged.
    pub fn splice_keyblobs(&mut self, keyblobs: &[u8]) -> OtfadResult<()> {
        if keyblobs.len() > KEY_BLOB_REGION_BYTE_SIZE {
            return Err(OtfadError::KeyBlobsTooLarge(
                keyblobs.len(),
                KEY_BLOB_REGION_BYTE_SIZE,
            ));
        }
        if self.len < KEY_BLOB_REGION_BYTE_SIZE as u64 {
            return Err(OtfadError::ImageTooShort(self.len));
        }

        let mut window = [0u8; KEY_BLOB_REGION_BYTE_SIZE];
        window[..keyblobs.len()].copy_from_slice(keyblobs);
        let map_err = |err| OtfadError::io("splicing key blobs into", &self.path, err);
        self.writer.seek(SeekFrom::Start(0)).map_err(map_err)?;
        self.writer.write_all(&window).map_err(map_err)?;
        self.writer.seek(SeekFrom::End(0)).map_err(map_err)?;
        self.writer.flush().map_err(map_err)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

/// Final image produced by [`assemble`]
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AssembledImage {
    pub path: PathBuf,

    pub len: u64,

    /// Concatenated key blobs, as spliced into the image
    pub keyblobs: PathBuf,
}

/// Assemble the final image.
///
/// # Arguments
///
/// * `header` - Boot header written by the encryption engine, moved into `work_dir`
/// * `work_dir` - Working directory holding the per-partition artifacts
/// * `table` - Partition table naming the artifacts
/// * `output` - Final image path
///
/// The image is built at `<output>.partial` and renamed onto `output` once
/// complete; on failure the partial file is removed.
pub fn assemble(
    header: &Path,
    work_dir: &Path,
    table: &PartitionTable,
    output: &Path,
) -> OtfadResult<AssembledImage> {
    info!("Assembling keyblobs and encrypted image");
    let staged_header = work_dir.join("header");
    fs::move_file(header, &staged_header)?;

    let keyblobs = concat_keyblobs(work_dir, table)?;

    let partial = partial_path(output);
    let len = match write_image(&staged_header, table, &keyblobs.1, &partial) {
        Ok(len) => len,
        Err(err) => {
            let _ = std::fs::remove_file(&partial);
            return Err(err);
        }
    };
    std::fs::rename(&partial, output)
        .map_err(|err| OtfadError::io("renaming assembled image to", output, err))?;

    info!("OTFAD image created: {}", output.display());
    Ok(AssembledImage {
        path: output.to_path_buf(),
        len,
        keyblobs: keyblobs.0,
    })
}

/// Key blobs of slots 1 to 4 written to `<work_dir>/keyblobs`
fn concat_keyblobs(work_dir: &Path, table: &PartitionTable) -> OtfadResult<(PathBuf, Vec<u8>)> {
    let mut keyblobs = Vec::with_capacity(KEY_BLOB_REGION_BYTE_SIZE);
    for partition in table.iter() {
        keyblobs.extend(fs::read(&partition.artifacts().keyblob)?);
    }
    let path = work_dir.join("keyblobs");
    std::fs::write(&path, &keyblobs)
        .map_err(|err| OtfadError::io("writing key blobs to", &path, err))?;
    Ok((path, keyblobs))
}

fn write_image(
    header: &Path,
    table: &PartitionTable,
    keyblobs: &[u8],
    path: &Path,
) -> OtfadResult<u64> {
    let file =
        File::create(path).map_err(|err| OtfadError::io("creating image file", path, err))?;
    let mut writer = ImageBundleWriter::new(file, path);

    let sections = std::iter::once(header)
        .chain(table.iter().map(|p| p.artifacts().enc_image.as_path()));
    for section in sections {
        let mut file = File::open(section)
            .map_err(|err| OtfadError::io("opening image section", section, err))?;
        writer.append(&mut file)?;
    }
    writer.splice_keyblobs(keyblobs)?;

    let len = writer.len();
    writer
        .into_inner()
        .sync_all()
        .map_err(|err| OtfadError::io("syncing image file", path, err))?;
    Ok(len)
}

fn partial_path(output: &Path) -> PathBuf {
    let mut path = output.as_os_str().to_owned();
    path.push(".partial");
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_splice_overwrites_window_only() {
        let mut writer = ImageBundleWriter::new(Cursor::new(Vec::new()), "image.bin");
        writer.append(&mut &[0xAAu8; 4096][..]).unwrap();
        writer.append(&mut &[0xBBu8; 100][..]).unwrap();
        assert_eq!(writer.len(), 4196);

        writer.splice_keyblobs(&[0x11u8; 200]).unwrap();
        let buf = writer.into_inner().into_inner();
        assert_eq!(buf.len(), 4196);
        assert!(buf[..200].iter().all(|&b| b == 0x11));
        // Short key blobs are zero padded up to the window size
        assert!(buf[200..KEY_BLOB_REGION_BYTE_SIZE].iter().all(|&b| b == 0));
        assert!(buf[KEY_BLOB_REGION_BYTE_SIZE..4096]
            .iter()
            .all(|&b| b == 0xAA));
        assert!(buf[4096..].iter().all(|&b| b == 0xBB));
    }

    #[test]
    fn test_splice_appends_after_window() {
        let mut writer = ImageBundleWriter::new(Cursor::new(Vec::new()), "image.bin");
        writer.append(&mut &[0u8; 512][..]).unwrap();
        writer.splice_keyblobs(&[0x22u8; 256]).unwrap();
        writer.append(&mut &[0x33u8; 16][..]).unwrap();

        let buf = writer.into_inner().into_inner();
        assert_eq!(buf.len(), 528);
        assert!(buf[512..].iter().all(|&b| b == 0x33));
    }

    #[test]
    fn test_splice_rejects_oversized_keyblobs() {
        let mut writer = ImageBundleWriter::new(Cursor::new(Vec::new()), "image.bin");
        writer.append(&mut &[0u8; 4096][..]).unwrap();
        let err = writer.splice_keyblobs(&[0u8; 257]).unwrap_err();
        assert!(matches!(err, OtfadError::KeyBlobsTooLarge(257, 256)));
        assert_eq!(err.kind(), ErrorKind::Assembly);
    }

    #[test]
    fn test_splice_rejects_short_image() {
        let mut writer = ImageBundleWriter::new(Cursor::new(Vec::new()), "image.bin");
        assert!(writer.is_empty());
        let err = writer.splice_keyblobs(&[]).unwrap_err();
        assert!(matches!(err, OtfadError::ImageTooShort(0)));

        writer.append(&mut &[0u8; 100][..]).unwrap();
        assert!(!writer.is_empty());
        let err = writer.splice_keyblobs(&[0u8; 256]).unwrap_err();
        assert!(matches!(err, OtfadError::ImageTooShort(100)));
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("result/otfad.bin")),
            Path::new("result/otfad.bin.partial")
        );
    }
}
