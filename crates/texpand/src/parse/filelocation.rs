use crate::prelude as txl;
use crate::token;
use crate::traits::*;
use crate::vm;
use std::path;

/// A file name as it appears after `\input`.
///
/// The name is read from expanded character tokens and ends at the first
///     space, which is consumed, or at the first non-character token, which is not.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct FileLocation {
    pub path: String,
    pub extension: Option<String>,
}

impl<S: TexlangState> Parsable<S> for FileLocation {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        let mut raw_string = String::new();
        let mut ext_delimiter = None;
        loop {
            let t = match input.peek()? {
                None => break,
                Some(t) => t,
            };
            if let token::Value::Space(_) = t.value() {
                input.consume()?;
                break;
            }
            let c = match t.char() {
                None => break,
                Some(c) => c,
            };
            input.consume()?;
            match c {
                '/' => {
                    ext_delimiter = None;
                }
                '.' => {
                    ext_delimiter = Some(raw_string.len());
                }
                _ => (),
            }
            raw_string.push(c);
        }
        Ok(FileLocation {
            path: raw_string[..ext_delimiter.unwrap_or(raw_string.len())].into(),
            extension: ext_delimiter.map(|j| raw_string[j + 1..].into()),
        })
    }
}

impl FileLocation {
    /// Returns the path of the file, adding the default extension if the name has none.
    ///
    /// A relative path is resolved against the working directory, if there is one.
    pub fn determine_full_path(
        &self,
        working_directory: Option<&path::Path>,
        default_extension: &str,
    ) -> path::PathBuf {
        let mut path: path::PathBuf = match working_directory {
            None => Default::default(),
            Some(working_directory) => working_directory.into(),
        };
        path.push(std::ffi::OsString::from(&self.path));
        path.set_extension(std::ffi::OsString::from(
            self.extension.as_deref().unwrap_or(default_extension),
        ));
        path
    }
}
