/*!
Test support helpers shared across integration tests.

- pipe_pair(): anonymous OS pipe as (read, write) Files; both ends stat as named pipes
- regular_file(contents): unlinked temp file positioned at offset 0
- read_back(file): rewind and read a temp file to a String
- argv(words): Vec<String> from string literals
- have_sh(): check /bin/sh availability
*/

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::process::Command;

#[allow(dead_code)]
pub fn argv(words: &[&str]) -> Vec<String> {
    words.iter().map(|s| s.to_string()).collect()
}

#[allow(dead_code)]
pub fn pipe_pair() -> (File, File) {
    let (r, w) = nix::unistd::pipe().expect("pipe");
    (File::from(r), File::from(w))
}

#[allow(dead_code)]
pub fn regular_file(contents: &str) -> File {
    let mut f = tempfile::tempfile().expect("tmpfile");
    f.write_all(contents.as_bytes()).expect("write tmpfile");
    f.seek(SeekFrom::Start(0)).expect("rewind tmpfile");
    f
}

#[allow(dead_code)]
pub fn read_back(f: &mut File) -> String {
    let mut s = String::new();
    f.seek(SeekFrom::Start(0)).expect("rewind");
    f.read_to_string(&mut s).expect("read back");
    s
}

/// Return true if `sh` is available.
#[allow(dead_code)]
pub fn have_sh() -> bool {
    Command::new("sh")
        .arg("-c")
        .arg("true")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[allow(dead_code)]
pub fn dir_is_empty(dir: &std::path::Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut it| it.next().is_none())
        .unwrap_or(false)
}
