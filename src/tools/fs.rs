use std::io;

use async_trait::async_trait;
use camino::{Utf8Path, Utf8PathBuf};

use crate::error::WalkError;

/// File access used by the build stages.
#[async_trait]
pub trait Filesystem: Send + Sync {
    async fn read_to_string(&self, path: &Utf8Path) -> io::Result<String>;

    /// Write `data`, creating missing parent directories.
    async fn write(&self, path: &Utf8Path, data: &[u8]) -> io::Result<()>;

    /// Copy a file, or a directory recursively. Symbolic links are
    /// recreated as links, never followed.
    async fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()>;

    /// Make sure `path` exists and has no entries.
    async fn empty_dir(&self, path: &Utf8Path) -> io::Result<()>;

    /// Files matching a glob pattern, sorted.
    fn walk(&self, pattern: &str) -> Result<Vec<Utf8PathBuf>, WalkError>;
}

/// The local disk, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl Filesystem for LocalFs {
    async fn read_to_string(&self, path: &Utf8Path) -> io::Result<String> {
        tokio::fs::read_to_string(path).await
    }

    async fn write(&self, path: &Utf8Path, data: &[u8]) -> io::Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_str().is_empty()
        {
            tokio::fs::create_dir_all(dir).await?;
        }

        tokio::fs::write(path, data).await
    }

    async fn copy(&self, from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
        let mut pending = vec![(from.to_path_buf(), to.to_path_buf())];

        while let Some((src, dst)) = pending.pop() {
            let filetype = tokio::fs::symlink_metadata(&src).await?.file_type();

            if !filetype.is_dir() {
                if let Some(dir) = dst.parent()
                    && !dir.as_str().is_empty()
                {
                    tokio::fs::create_dir_all(dir).await?;
                }

                match filetype.is_symlink() {
                    true => copy_link(&src, &dst).await?,
                    false => {
                        tokio::fs::copy(&src, &dst).await?;
                    }
                }
                continue;
            }

            tokio::fs::create_dir_all(&dst).await?;

            let mut entries = tokio::fs::read_dir(&src).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name();
                let Some(name) = name.to_str() else {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("non UTF-8 file name in {src}"),
                    ));
                };
                pending.push((src.join(name), dst.join(name)));
            }
        }

        Ok(())
    }

    async fn empty_dir(&self, path: &Utf8Path) -> io::Result<()> {
        if tokio::fs::metadata(path).await.is_ok() {
            tokio::fs::remove_dir_all(path).await?;
        }

        tokio::fs::create_dir_all(path).await
    }

    fn walk(&self, pattern: &str) -> Result<Vec<Utf8PathBuf>, WalkError> {
        let mut paths = Vec::new();

        for entry in glob::glob(pattern)? {
            let path = Utf8PathBuf::try_from(entry?)?;
            if path.is_file() {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }
}

/// Recreate the link at `src` under `dst`, pointing at the same target.
#[cfg(unix)]
async fn copy_link(src: &Utf8Path, dst: &Utf8Path) -> io::Result<()> {
    let target = tokio::fs::read_link(src).await?;
    tokio::fs::symlink(target, dst).await
}

#[cfg(windows)]
async fn copy_link(src: &Utf8Path, dst: &Utf8Path) -> io::Result<()> {
    let target = tokio::fs::read_link(src).await?;

    match tokio::fs::metadata(src).await.map(|m| m.is_dir()) {
        Ok(true) => tokio::fs::symlink_dir(target, dst).await,
        _ => tokio::fs::symlink_file(target, dst).await,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn tempdir() -> (tempfile::TempDir, Utf8PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    #[tokio::test]
    async fn test_write_creates_parents() {
        let (_guard, root) = tempdir();
        let file = root.join("a/b/c.txt");

        LocalFs.write(&file, b"hello").await.unwrap();
        assert_eq!(LocalFs.read_to_string(&file).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_copy_directory() {
        let (_guard, root) = tempdir();
        LocalFs.write(&root.join("in/x.txt"), b"x").await.unwrap();
        LocalFs.write(&root.join("in/sub/y.txt"), b"y").await.unwrap();

        LocalFs.copy(&root.join("in"), &root.join("out")).await.unwrap();

        assert_eq!(LocalFs.read_to_string(&root.join("out/x.txt")).await.unwrap(), "x");
        assert_eq!(LocalFs.read_to_string(&root.join("out/sub/y.txt")).await.unwrap(), "y");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_copy_keeps_symlinks() {
        let (_guard, root) = tempdir();
        LocalFs.write(&root.join("in/x.txt"), b"x").await.unwrap();
        std::os::unix::fs::symlink("..", root.join("in/up")).unwrap();
        std::os::unix::fs::symlink("x.txt", root.join("in/alias.txt")).unwrap();

        LocalFs.copy(&root.join("in"), &root.join("out")).await.unwrap();

        let up = root.join("out/up");
        assert!(std::fs::symlink_metadata(&up).unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_link(&up).unwrap(), std::path::Path::new(".."));
        assert_eq!(
            std::fs::read_link(root.join("out/alias.txt")).unwrap(),
            std::path::Path::new("x.txt")
        );
        assert_eq!(LocalFs.read_to_string(&root.join("out/alias.txt")).await.unwrap(), "x");
    }

    #[tokio::test]
    async fn test_empty_dir() {
        let (_guard, root) = tempdir();
        let out = root.join("dist");
        LocalFs.write(&out.join("stale.js"), b"old").await.unwrap();

        LocalFs.empty_dir(&out).await.unwrap();

        assert!(out.is_dir());
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 0);

        // missing directory gets created
        let fresh = root.join("fresh");
        LocalFs.empty_dir(&fresh).await.unwrap();
        assert!(fresh.is_dir());
    }

    #[tokio::test]
    async fn test_walk_sorted_files_only() {
        let (_guard, root) = tempdir();
        LocalFs.write(&root.join("b.js"), b"").await.unwrap();
        LocalFs.write(&root.join("a/c.js"), b"").await.unwrap();
        LocalFs.write(&root.join("a/d.css"), b"").await.unwrap();

        let found = LocalFs.walk(&format!("{root}/**/*.js")).unwrap();
        assert_eq!(found, vec![root.join("a/c.js"), root.join("b.js")]);
    }
}
