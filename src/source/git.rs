//! Object source over git plumbing subprocesses.
//!
//! References are enumerated with `git for-each-ref`; reachable object
//! headers come from `git rev-list --objects --topo-order --stdin` piped
//! through `git cat-file --batch-check`; full bodies come from
//! `git cat-file --batch`. Child stdin is fed from dedicated writer threads
//! so the blocking reads on this side can never deadlock against a full
//! pipe. Every stream owns its children and kills them when dropped, on any
//! exit path.

use std::{
    io::{BufRead, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    process::{Child, ChildStdout, Command, Stdio},
    str::FromStr,
    thread::JoinHandle,
};

use bstr::{BString, ByteSlice};

use crate::{
    errors::GitError,
    hash::ObjectHash,
    internal::object::types::ObjectType,
    source::{BatchHeader, ContentsIter, HeaderIter, ObjectSource, RefIter, Reference},
};

/// A handle on one local repository, addressed through the `git` binary.
pub struct GitRepository {
    git_dir: PathBuf,
}

impl GitRepository {
    /// Locate the git directory behind `path`. Fails when the path is not a
    /// repository, when the repository is shallow, or when the git binary
    /// cannot run at all.
    pub fn open(path: &Path) -> Result<GitRepository, GitError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(path)
            .arg("rev-parse")
            .arg("--absolute-git-dir")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GitError::GitSpawn(e.to_string()))?;
        if !output.status.success() {
            return Err(GitError::RepositoryNotFound(path.display().to_string()));
        }
        let git_dir = PathBuf::from(
            String::from_utf8_lossy(&output.stdout).trim().to_string(),
        );
        if git_dir.join("shallow").exists() {
            return Err(GitError::ShallowRepository(path.display().to_string()));
        }
        tracing::debug!("opened git repository at {}", git_dir.display());
        Ok(GitRepository { git_dir })
    }

    fn git_command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("--git-dir")
            .arg(&self.git_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd
    }
}

impl ObjectSource for GitRepository {
    fn references(&self) -> Result<RefIter<'_>, GitError> {
        let mut child = self
            .git_command()
            .arg("for-each-ref")
            .arg("--format=%(objectname) %(objecttype) %(objectsize) %(refname)")
            .spawn()
            .map_err(|e| GitError::GitSpawn(e.to_string()))?;
        let stdout = take_stdout(&mut child)?;
        Ok(Box::new(RefStream {
            child,
            reader: BufReader::new(stdout),
            done: false,
        }))
    }

    fn reachable_object_headers(&self, roots: &[ObjectHash]) -> Result<HeaderIter<'_>, GitError> {
        let mut revlist = self
            .git_command()
            .arg("rev-list")
            .arg("--objects")
            .arg("--topo-order")
            .arg("--stdin")
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| GitError::GitSpawn(e.to_string()))?;
        let revlist_stdin = revlist
            .stdin
            .take()
            .ok_or_else(|| GitError::GitSpawn("rev-list stdin unavailable".to_string()))?;
        let revlist_stdout = take_stdout(&mut revlist)?;

        let mut catfile = self
            .git_command()
            .arg("cat-file")
            .arg("--batch-check")
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| GitError::GitSpawn(e.to_string()))?;
        let catfile_stdin = catfile
            .stdin
            .take()
            .ok_or_else(|| GitError::GitSpawn("cat-file stdin unavailable".to_string()))?;
        let catfile_stdout = take_stdout(&mut catfile)?;

        let roots: Vec<ObjectHash> = roots.to_vec();
        let feeder = std::thread::spawn(move || -> std::io::Result<()> {
            let mut writer = BufWriter::new(revlist_stdin);
            for oid in roots {
                writeln!(writer, "{oid}")?;
            }
            writer.flush()
        });
        // copy the object id column of rev-list into the batch checker
        let pump = std::thread::spawn(move || -> std::io::Result<()> {
            let mut reader = BufReader::new(revlist_stdout);
            let mut writer = BufWriter::new(catfile_stdin);
            let mut line = Vec::new();
            loop {
                line.clear();
                if reader.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                let end = line
                    .iter()
                    .position(|&b| b == b' ' || b == b'\n')
                    .unwrap_or(line.len());
                writer.write_all(&line[..end])?;
                writer.write_all(b"\n")?;
            }
            writer.flush()
        });

        Ok(Box::new(HeaderStream {
            revlist,
            catfile,
            reader: BufReader::new(catfile_stdout),
            feeder: Some(feeder),
            pump: Some(pump),
            done: false,
        }))
    }

    fn object_contents(&self, oids: Vec<ObjectHash>) -> Result<ContentsIter<'_>, GitError> {
        let mut child = self
            .git_command()
            .arg("cat-file")
            .arg("--batch")
            .stdin(Stdio::piped())
            .spawn()
            .map_err(|e| GitError::GitSpawn(e.to_string()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| GitError::GitSpawn("cat-file stdin unavailable".to_string()))?;
        let stdout = take_stdout(&mut child)?;
        let feeder = std::thread::spawn(move || -> std::io::Result<()> {
            let mut writer = BufWriter::new(stdin);
            for oid in oids {
                writeln!(writer, "{oid}")?;
            }
            writer.flush()
        });
        Ok(Box::new(ContentsStream {
            child,
            reader: BufReader::new(stdout),
            feeder: Some(feeder),
            done: false,
        }))
    }

    fn resolve_object(&self, spec: &str) -> Result<ObjectHash, GitError> {
        let output = Command::new("git")
            .arg("--git-dir")
            .arg(&self.git_dir)
            .arg("rev-parse")
            .arg("--verify")
            .arg("--quiet")
            .arg(format!("{spec}^{{object}}"))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| GitError::GitSpawn(e.to_string()))?;
        if !output.status.success() {
            return Err(GitError::UnresolvedObject(spec.to_string()));
        }
        ObjectHash::from_str(String::from_utf8_lossy(&output.stdout).trim())
    }
}

fn take_stdout(child: &mut Child) -> Result<ChildStdout, GitError> {
    child
        .stdout
        .take()
        .ok_or_else(|| GitError::GitSpawn("subprocess stdout unavailable".to_string()))
}

fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn wait_success(child: &mut Child, what: &str) -> Result<(), GitError> {
    let status = child.wait()?;
    if status.success() {
        Ok(())
    } else {
        Err(GitError::SourceProtocol(format!(
            "git {what} exited with {status}"
        )))
    }
}

fn join_io_thread(
    handle: Option<JoinHandle<std::io::Result<()>>>,
    what: &str,
) -> Result<(), GitError> {
    if let Some(handle) = handle {
        match handle.join() {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(GitError::SourceProtocol(format!("{what}: {e}"))),
            Err(_) => Err(GitError::SourceProtocol(format!("{what}: writer panicked"))),
        }
    } else {
        Ok(())
    }
}

/// Parse an ASCII decimal field.
fn parse_size(field: &[u8], line: &[u8]) -> Result<u64, GitError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| {
            GitError::SourceProtocol(format!("bad size in line `{}`", line.as_bstr()))
        })
}

/// `<oid> SP <type> SP <size>` or `<oid> SP missing`, as emitted by
/// `cat-file --batch-check` and at the head of each `--batch` record.
fn parse_batch_header(line: &[u8]) -> Result<BatchHeader, GitError> {
    let fields: Vec<&[u8]> = line.splitn_str(3, " ").collect();
    if fields.len() < 2 {
        return Err(GitError::SourceProtocol(format!(
            "bad batch line `{}`",
            line.as_bstr()
        )));
    }
    let oid = ObjectHash::from_hex_bytes(fields[0])?;
    let object_type = ObjectType::from_bytes(fields[1])?;
    let size = if object_type == ObjectType::Missing {
        0
    } else if fields.len() == 3 {
        parse_size(fields[2], line)?
    } else {
        return Err(GitError::SourceProtocol(format!(
            "bad batch line `{}`",
            line.as_bstr()
        )));
    };
    Ok(BatchHeader {
        oid,
        object_type,
        size,
    })
}

struct RefStream {
    child: Child,
    reader: BufReader<ChildStdout>,
    done: bool,
}

impl RefStream {
    /// `<oid> SP <type> SP <size> SP <refname>`; refnames cannot contain
    /// spaces, so a plain split is exact.
    fn parse_line(line: &[u8]) -> Result<Reference, GitError> {
        let fields: Vec<&[u8]> = line.splitn_str(4, " ").collect();
        if fields.len() != 4 || fields[3].is_empty() {
            return Err(GitError::SourceProtocol(format!(
                "bad for-each-ref line `{}`",
                line.as_bstr()
            )));
        }
        Ok(Reference {
            name: BString::from(fields[3]),
            oid: ObjectHash::from_hex_bytes(fields[0])?,
            object_type: ObjectType::from_bytes(fields[1])?,
            size: parse_size(fields[2], line)?,
        })
    }
}

impl Iterator for RefStream {
    type Item = Result<Reference, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_line(&mut self.reader) {
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
            Ok(None) => {
                self.done = true;
                match wait_success(&mut self.child, "for-each-ref") {
                    Ok(()) => None,
                    Err(e) => Some(Err(e)),
                }
            }
            Ok(Some(line)) => Some(RefStream::parse_line(&line)),
        }
    }
}

impl Drop for RefStream {
    fn drop(&mut self) {
        if !self.done {
            reap(&mut self.child);
        }
    }
}

struct HeaderStream {
    revlist: Child,
    catfile: Child,
    reader: BufReader<ChildStdout>,
    feeder: Option<JoinHandle<std::io::Result<()>>>,
    pump: Option<JoinHandle<std::io::Result<()>>>,
    done: bool,
}

impl HeaderStream {
    fn finish(&mut self) -> Result<(), GitError> {
        join_io_thread(self.feeder.take(), "feeding rev-list")?;
        join_io_thread(self.pump.take(), "piping rev-list into cat-file")?;
        wait_success(&mut self.revlist, "rev-list")?;
        wait_success(&mut self.catfile, "cat-file --batch-check")
    }
}

impl Iterator for HeaderStream {
    type Item = Result<BatchHeader, GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_line(&mut self.reader) {
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
            Ok(None) => {
                self.done = true;
                match self.finish() {
                    Ok(()) => None,
                    Err(e) => Some(Err(e)),
                }
            }
            Ok(Some(line)) => Some(parse_batch_header(&line)),
        }
    }
}

impl Drop for HeaderStream {
    fn drop(&mut self) {
        if !self.done {
            reap(&mut self.revlist);
            reap(&mut self.catfile);
            let _ = self.feeder.take().map(|t| t.join());
            let _ = self.pump.take().map(|t| t.join());
        }
    }
}

struct ContentsStream {
    child: Child,
    reader: BufReader<ChildStdout>,
    feeder: Option<JoinHandle<std::io::Result<()>>>,
    done: bool,
}

impl ContentsStream {
    fn read_record(&mut self) -> Result<Option<(BatchHeader, Vec<u8>)>, GitError> {
        let Some(line) = read_line(&mut self.reader)? else {
            join_io_thread(self.feeder.take(), "feeding cat-file")?;
            wait_success(&mut self.child, "cat-file --batch")?;
            return Ok(None);
        };
        let header = parse_batch_header(&line)?;
        if header.object_type == ObjectType::Missing {
            return Err(GitError::MissingObject(header.oid.to_string()));
        }
        let size = usize::try_from(header.size).map_err(|_| {
            GitError::SourceProtocol(format!("object {} too large to buffer", header.oid))
        })?;
        let mut body = vec![0u8; size];
        self.reader.read_exact(&mut body)?;
        let mut terminator = [0u8; 1];
        self.reader.read_exact(&mut terminator)?;
        if terminator[0] != b'\n' {
            return Err(GitError::SourceProtocol(format!(
                "trailing bytes malformed after object {}",
                header.oid
            )));
        }
        Ok(Some((header, body)))
    }
}

impl Iterator for ContentsStream {
    type Item = Result<(BatchHeader, Vec<u8>), GitError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for ContentsStream {
    fn drop(&mut self) {
        if !self.done {
            reap(&mut self.child);
            let _ = self.feeder.take().map(|t| t.join());
        }
    }
}

/// Read one LF-terminated line, without the terminator. `None` at EOF.
fn read_line(reader: &mut BufReader<ChildStdout>) -> Result<Option<Vec<u8>>, GitError> {
    let mut line = Vec::new();
    let n = reader.read_until(b'\n', &mut line)?;
    if n == 0 {
        return Ok(None);
    }
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(Some(line))
}

#[cfg(test)]
mod tests {
    use super::parse_batch_header;
    use crate::internal::object::types::ObjectType;

    /// Batch-check lines parse into headers; `missing` is a recognized kind.
    #[test]
    fn test_parse_batch_header() {
        let h = parse_batch_header(b"8ab686eafeb1f44702738c8b0f24f2567c36da6d blob 1234").unwrap();
        assert_eq!(h.object_type, ObjectType::Blob);
        assert_eq!(h.size, 1234);

        let h = parse_batch_header(b"8ab686eafeb1f44702738c8b0f24f2567c36da6d missing").unwrap();
        assert_eq!(h.object_type, ObjectType::Missing);
        assert_eq!(h.size, 0);
    }

    /// Malformed batch lines are protocol errors.
    #[test]
    fn test_parse_batch_header_malformed() {
        assert!(parse_batch_header(b"justonefield").is_err());
        assert!(parse_batch_header(b"8ab686eafeb1f44702738c8b0f24f2567c36da6d blob").is_err());
        assert!(parse_batch_header(b"nothex blob 10").is_err());
        assert!(
            parse_batch_header(b"8ab686eafeb1f44702738c8b0f24f2567c36da6d blob tiny").is_err()
        );
    }
}
