//! Filepath: src/infra/utils.rs
//! Utility helpers organized by small, focused structs.
//! All functions are associated fns to keep call sites
//! ergonomic, testable, and discoverable.

use std::fs;
use std::io;
use std::path::{Component, Path};

/// Slash-separated path string helpers
pub struct PathUtils;

impl PathUtils
{
    /// Render a relative path with `/` separators
    pub fn to_slash(path: &Path) -> String
    {
        let parts: Vec<String> = path
            .components()
            .filter_map(|c| match c
            {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();

        parts.join("/")
    }

    /// Swap a trailing `.from` extension for `.to`; other names pass through
    pub fn replace_extension(
        name: &str,
        from: &str,
        to: &str,
    ) -> String
    {
        match name.strip_suffix(from)
        {
            Some(stem) if stem.ends_with('.') => format!("{stem}{to}"),
            _ => name.to_string(),
        }
    }

    /// True if the file name carries the given extension
    pub fn has_extension(
        path: &Path,
        ext: &str,
    ) -> bool
    {
        path.extension()
            .is_some_and(|e| e == ext)
    }
}

/// Filesystem write helpers for the mirrored tree
pub struct FsUtils;

impl FsUtils
{
    /// Clear the read-only bit of an existing file so it can be replaced.
    /// Missing files are fine.
    pub fn make_writable(path: &Path) -> io::Result<()>
    {
        let meta = match fs::metadata(path)
        {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let mut perms = meta.permissions();
        if perms.readonly()
        {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                perms.set_mode(perms.mode() | 0o200);
            }
            #[cfg(not(unix))]
            perms.set_readonly(false);

            fs::set_permissions(path, perms)?;
        }
        Ok(())
    }

    /// Set the executable bits for user, group and others (unix only)
    pub fn make_executable(path: &Path) -> io::Result<()>
    {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(perms.mode() | 0o111);
            fs::set_permissions(path, perms)?;
        }
        #[cfg(not(unix))]
        let _ = path;
        Ok(())
    }

    /// Write text, creating parents and replacing read-only files
    pub fn write_text(
        path: &Path,
        contents: &str,
    ) -> io::Result<()>
    {
        Self::prepare_target(path)?;
        fs::write(path, contents)
    }

    /// Copy a file, creating parents and replacing read-only targets
    pub fn copy_file(
        from: &Path,
        to: &Path,
    ) -> io::Result<()>
    {
        Self::prepare_target(to)?;
        fs::copy(from, to)?;
        // Copies inherit the source mode; keep the mirror writable
        Self::make_writable(to)
    }

    fn prepare_target(path: &Path) -> io::Result<()>
    {
        if let Some(parent) = path.parent()
        {
            fs::create_dir_all(parent)?;
        }
        Self::make_writable(path)
    }
}

#[cfg(test)]
mod tests
{
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn slash_paths()
    {
        let p: PathBuf = ["a", "b", "c.edl"].iter().collect();
        assert_eq!(PathUtils::to_slash(&p), "a/b/c.edl");
        assert_eq!(PathUtils::to_slash(Path::new("")), "");
    }

    #[test]
    fn extension_swap()
    {
        assert_eq!(PathUtils::replace_extension("sub/motor.edl", "edl", "opi"), "sub/motor.opi");
        assert_eq!(PathUtils::replace_extension("motor.png", "edl", "opi"), "motor.png");
        assert_eq!(PathUtils::replace_extension("noedl", "edl", "opi"), "noedl");
    }

    #[cfg(unix)]
    #[test]
    fn overwrites_read_only_file()
    {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/out.opi");
        FsUtils::write_text(&path, "one").unwrap();

        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&path, perms).unwrap();

        FsUtils::write_text(&path, "two").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn copy_creates_parents()
    {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("a.png");
        fs::write(&src, "img").unwrap();

        let dst = tmp.path().join("x/y/a.png");
        FsUtils::copy_file(&src, &dst).unwrap();
        assert_eq!(fs::read_to_string(dst).unwrap(), "img");
    }
}
