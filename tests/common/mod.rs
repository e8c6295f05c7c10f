//! Shared test infrastructure for integration tests.
#![allow(dead_code)]

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::process::{Command, Output};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const MMCV: &str = "mmcv-2.1.0-cp310-cp310-linux_x86_64.whl";

/// Run the compiled binary with a clean probe environment.
pub fn run_wheelstamp(args: &[&str]) -> Output {
    run_wheelstamp_with_env(args, &[])
}

pub fn run_wheelstamp_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
    let mut command = Command::new(env!("CARGO_BIN_EXE_wheelstamp"));
    command.args(args).env_remove("WHEELSTAMP_PYTHON").env("RUST_LOG", "info");
    for (key, value) in env {
        command.env(key, value);
    }
    command.output().expect("run wheelstamp")
}

/// A `--python` command that prints canned probe output.
pub fn fake_python(torch: &str, numpy: &str) -> String {
    let script = format!("echo '{{\"torch\": \"{torch}\", \"numpy\": \"{numpy}\"}}'");
    shell_words::join(["sh", "-c", script.as_str()])
}

/// Write an mmcv-like wheel with a package module, METADATA, WHEEL and RECORD.
pub fn write_mmcv_wheel(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let entries: Vec<(String, Vec<u8>)> = vec![
        ("mmcv/__init__.py".to_string(), b"__version__ = '2.1.0'\n".to_vec()),
        ("mmcv/_ext.so".to_string(), vec![0x7f, b'E', b'L', b'F', 0, 1, 2, 3]),
        (
            "mmcv-2.1.0.dist-info/METADATA".to_string(),
            b"Metadata-Version: 2.1\nName: mmcv\nVersion: 2.1.0\nRequires-Dist: numpy\n\nOpenMMLab Computer Vision Foundation\n".to_vec(),
        ),
        (
            "mmcv-2.1.0.dist-info/WHEEL".to_string(),
            b"Wheel-Version: 1.0\nRoot-Is-Purelib: false\nTag: cp310-cp310-linux_x86_64\n".to_vec(),
        ),
        (
            "mmcv-2.1.0.dist-info/RECORD".to_string(),
            b"mmcv/__init__.py,,\nmmcv-2.1.0.dist-info/METADATA,,\nmmcv-2.1.0.dist-info/RECORD,,\n".to_vec(),
        ),
    ];
    write_zip(&dir.join(MMCV), &entries);
    entries
}

pub fn write_zip(path: &Path, entries: &[(String, Vec<u8>)]) {
    let file = File::create(path).expect("create wheel");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(name.as_str(), options).expect("start file");
        writer.write_all(content).expect("write entry");
    }
    writer.finish().expect("finish wheel");
}

pub fn read_entries(path: &Path) -> Vec<(String, Vec<u8>)> {
    let mut archive = ZipArchive::new(File::open(path).expect("open")).expect("zip");
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).expect("entry");
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).expect("read entry");
        entries.push((entry.name().to_string(), bytes));
    }
    entries
}

pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Lines of METADATA that carry the version field.
pub fn version_lines(entries: &[(String, Vec<u8>)], dist_info: &str) -> Vec<String> {
    let metadata_name = format!("{dist_info}/METADATA");
    let (_, metadata) = entries
        .iter()
        .find(|(name, _)| *name == metadata_name)
        .expect("METADATA entry");
    String::from_utf8_lossy(metadata)
        .lines()
        .filter(|line| line.starts_with("Version:"))
        .map(str::to_string)
        .collect()
}
