use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom, Take},
    path::{Path as FsPath, PathBuf},
    sync::Arc,
};

use log::debug;
use zedcore::{magic::TRAILER_MAX_SIZE, types::TypeContext};

use crate::{
    error::{IndexError, IndexResult},
    stream::StreamReader,
    trailer::Trailer,
};

/// Slack on top of the frame threshold for the read buffer, since frames
/// close after the value that crosses the threshold.
const BUFFER_SLACK: usize = 4096;

pub type SectionReader = StreamReader<BufReader<Take<File>>>;

/// An open microindex: its trailer plus access to each section.
pub struct Reader {
    path: PathBuf,
    size: u64,
    trailer: Trailer,
    zctx: Arc<TypeContext>,
}

impl Reader {
    pub fn open(path: impl AsRef<FsPath>, zctx: Arc<TypeContext>) -> IndexResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = File::open(&path)?;
        let size = file.metadata()?.len();
        let tail_len = size.min(TRAILER_MAX_SIZE as u64);
        file.seek(SeekFrom::Start(size - tail_len))?;
        let mut tail = Vec::with_capacity(tail_len as usize);
        file.take(tail_len).read_to_end(&mut tail)?;
        let trailer = Trailer::find(&tail, &zctx)?;
        let indexed: u64 = trailer.sections.iter().sum();
        if indexed > size {
            return Err(IndexError::Malformed(format!(
                "sections span {indexed} bytes of a {size}-byte file"
            )));
        }
        debug!(
            "microindex {} opened: {} level(s), keys {:?}",
            path.display(),
            trailer.levels(),
            trailer.keys.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
        Ok(Self {
            path,
            size,
            trailer,
            zctx,
        })
    }

    pub fn path(&self) -> &FsPath {
        &self.path
    }

    /// File size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn trailer(&self) -> &Trailer {
        &self.trailer
    }

    pub fn zctx(&self) -> &Arc<TypeContext> {
        &self.zctx
    }

    /// Stream the values of `level` starting `offset` bytes into its section.
    /// `offset` must fall on a frame boundary.
    pub fn section_reader(&self, level: usize, offset: u64) -> IndexResult<SectionReader> {
        let (start, len) = self
            .trailer
            .section(level)
            .ok_or_else(|| IndexError::NotFound(format!("level {level} of {}", self.path.display())))?;
        if offset > len {
            return Err(IndexError::Malformed(format!(
                "offset {offset} outside level {level} of {len} bytes"
            )));
        }
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(start + offset))?;
        let capacity = self.trailer.frame_thresh + BUFFER_SLACK;
        Ok(StreamReader::new(
            BufReader::with_capacity(capacity, file.take(len - offset)),
            self.zctx.clone(),
        ))
    }

    /// Every indexed value, in key order.
    pub fn base_reader(&self) -> IndexResult<SectionReader> {
        self.section_reader(0, 0)
    }
}
