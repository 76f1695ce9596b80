//! Duplicate Detector Integration Tests
//!
//! Grouping same-named files by content and writing one representative per
//! distinct version.

use std::fs;
use std::path::Path;

use ekshiksha::core::archive::hash_file;
use ekshiksha::dupes::{output_duplicates, DupeFinder, DuplicateError};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

/// 5 versions of Three.js and 3 of Three.min.js, each copied around a few times
fn fixture() -> TempDir {
    let temp = TempDir::new().unwrap();
    let root = temp.path();

    let names = ["Three.js", "three.js", "THREE.js"];
    for version in 0..5 {
        for copy in 0..(version + 1) {
            let name = names[copy % names.len()];
            write(
                root,
                &format!("apps/app{}_{}/js/{}", version, copy, name),
                &format!("// three r{}", version),
            );
        }
    }

    for version in 0..3 {
        write(
            root,
            &format!("chapters/{}/Three.min.js", version),
            &format!("// three.min r{}", version),
        );
        write(
            root,
            &format!("chapters/{}/lib/three.min.js", version + 10),
            &format!("// three.min r{}", version),
        );
    }

    write(root, "apps/other/Three.jsx", "not a match");
    temp
}

#[test]
fn test_counts_distinct_versions() {
    let content = fixture();
    let finder = DupeFinder::new(content.path()).unwrap();

    let three = finder.find_duplicates("Three.js").unwrap();
    assert_eq!(three.len(), 5);
    assert_eq!(three.values().map(Vec::len).sum::<usize>(), 1 + 2 + 3 + 4 + 5);

    let three_min = finder.find_duplicates("Three.min.js").unwrap();
    assert_eq!(three_min.len(), 3);
    assert!(three_min.values().all(|paths| paths.len() == 2));
}

#[test]
fn test_groups_are_byte_identical() {
    let content = fixture();
    let finder = DupeFinder::new(content.path()).unwrap();

    for (hash, paths) in finder.find_duplicates("three.js").unwrap() {
        let first = fs::read(&paths[0]).unwrap();
        for path in &paths {
            assert_eq!(fs::read(path).unwrap(), first);
            assert_eq!(hash_file(path).unwrap(), hash);
        }
    }
}

#[test]
fn test_output_one_file_per_group() {
    let content = fixture();
    let out = TempDir::new().unwrap();
    let finder = DupeFinder::new(content.path()).unwrap();

    let three = finder.find_duplicates("Three.js").unwrap();
    let written = finder.output_duplicates(&three, out.path()).unwrap();
    assert_eq!(written.len(), 5);
    for hash in three.keys() {
        assert!(out.path().join(format!("{}.js", hash)).is_file());
    }

    let three_min = finder.find_duplicates("Three.min.js").unwrap();
    output_duplicates(&three_min, out.path()).unwrap();
    for hash in three_min.keys() {
        assert!(out.path().join(format!("{}.js", hash)).is_file());
    }

    assert_eq!(fs::read_dir(out.path()).unwrap().count(), 8);
}

#[test]
fn test_mixed_extensions_fail_loudly() {
    let content = TempDir::new().unwrap();
    write(content.path(), "a/lib.JS", "same");
    write(content.path(), "b/lib.js", "same");
    let out = TempDir::new().unwrap();

    let finder = DupeFinder::new(content.path()).unwrap();
    let groups = finder.find_duplicates("lib.js").unwrap();
    assert_eq!(groups.len(), 1);

    assert!(matches!(
        finder.output_duplicates(&groups, out.path()),
        Err(DuplicateError::ExtensionMismatch { .. })
    ));
}
