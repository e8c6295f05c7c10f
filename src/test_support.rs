//! Wheel fixtures shared by unit tests.
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Write a zip with the given entries; names ending in `/` become directories.
pub fn write_wheel(path: &Path, entries: &[(&str, &[u8])]) {
    let file = File::create(path).expect("create wheel");
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, content) in entries {
        if name.ends_with('/') {
            writer.add_directory(*name, options).expect("add dir");
        } else {
            writer.start_file(*name, options).expect("start file");
            writer.write_all(content).expect("write entry");
        }
    }
    writer.finish().expect("finish wheel");
}

/// Write a minimal well-formed wheel for `distribution` at `version`.
pub fn write_minimal_wheel(path: &Path, distribution: &str, version: &str) {
    let dist_info = format!("{distribution}-{version}.dist-info");
    let metadata = format!("Metadata-Version: 2.1\nName: {distribution}\nVersion: {version}\n");
    let module = format!("{distribution}/__init__.py");
    let metadata_name = format!("{dist_info}/METADATA");
    let wheel_name = format!("{dist_info}/WHEEL");
    write_wheel(
        path,
        &[
            (module.as_str(), b"VALUE = 1\n".as_slice()),
            (metadata_name.as_str(), metadata.as_bytes()),
            (wheel_name.as_str(), b"Wheel-Version: 1.0\n".as_slice()),
        ],
    );
}

/// All entries of a zip as `(name, bytes)` in archive order.
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

pub fn entry<'a>(entries: &'a [(String, Vec<u8>)], name: &str) -> Option<&'a [u8]> {
    entries
        .iter()
        .find(|(entry_name, _)| entry_name == name)
        .map(|(_, bytes)| bytes.as_slice())
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
