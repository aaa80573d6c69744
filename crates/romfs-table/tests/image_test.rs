//! Building images and reading them back.

use std::fs;
use std::sync::Arc;

use romfs_storage::{FileStorage, MemoryStorage, Storage};
use romfs_table::{EntryKind, RomFileInfo, RomFsBuilder, RomFsError, RomImage};
use tempfile::tempdir;

#[test]
fn test_build_in_memory_and_read_back() {
    let mut builder = RomFsBuilder::new();
    builder.add_directory("/empty").unwrap();
    builder.add_file("/readme.txt", b"hello romfs".to_vec()).unwrap();
    builder.add_file("/bin/tool", vec![0xAB; 100]).unwrap();
    builder.add_file("/bin/lib/a.so", vec![1, 2, 3]).unwrap();

    let layout = builder.layout();
    let storage = MemoryStorage::new(layout.total_size as usize);
    let header = builder.build_into(&storage).unwrap();
    assert_eq!(header, layout.header);

    let image = RomImage::open(&storage).unwrap();
    assert_eq!(image.read_file(b"/readme.txt").unwrap(), b"hello romfs");
    assert_eq!(image.read_file(b"/bin/tool").unwrap(), vec![0xAB; 100]);
    assert_eq!(image.read_file(b"/bin/lib/a.so").unwrap(), vec![1, 2, 3]);

    let root: Vec<_> = image
        .table()
        .read_dir(b"/")
        .unwrap()
        .into_iter()
        .map(|e| (e.kind, e.name_lossy()))
        .collect();
    assert!(root.contains(&(EntryKind::Directory, "empty".to_string())));
    assert!(root.contains(&(EntryKind::Directory, "bin".to_string())));
    assert!(root.contains(&(EntryKind::File, "readme.txt".to_string())));
    assert!(image.table().read_dir(b"/empty").unwrap().is_empty());
}

#[test]
fn test_files_list_in_name_order() {
    let mut builder = RomFsBuilder::new();
    for name in ["c", "a", "b"] {
        builder.add_file(format!("/d/{name}"), vec![]).unwrap();
    }
    let storage = MemoryStorage::new(builder.layout().total_size as usize);
    builder.build_into(&storage).unwrap();

    let image = RomImage::open(&storage).unwrap();
    let names: Vec<_> = image
        .table()
        .read_dir(b"/d")
        .unwrap()
        .iter()
        .map(|e| e.name_lossy())
        .collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[test]
fn test_build_host_tree_to_file() {
    let src = tempdir().unwrap();
    fs::create_dir_all(src.path().join("assets/img")).unwrap();
    fs::write(src.path().join("assets/img/logo.png"), b"\x89PNG").unwrap();
    fs::write(src.path().join("config.toml"), b"[a]\nb = 1\n").unwrap();
    fs::create_dir(src.path().join("empty")).unwrap();

    let mut builder = RomFsBuilder::new();
    builder.add_host_tree(src.path(), false).unwrap();
    assert_eq!(builder.directory_count(), 4);
    assert_eq!(builder.file_count(), 2);

    let out = tempdir().unwrap();
    let image_path = out.path().join("image.romfs");
    builder.build_to_file(&image_path).unwrap();

    let storage = Arc::new(FileStorage::open_readonly(&image_path).unwrap());
    let image = RomImage::open(Arc::clone(&storage)).unwrap();
    assert_eq!(image.read_file(b"/assets/img/logo.png").unwrap(), b"\x89PNG");
    assert_eq!(image.read_file(b"/config.toml").unwrap(), b"[a]\nb = 1\n");
    assert!(image.table().convert_path_to_directory_id(b"/empty").is_ok());
    assert_eq!(storage.size(), builder.layout().total_size);
}

#[test]
fn test_open_rejects_garbage() {
    let storage = MemoryStorage::filled(0x100, 0xEE);
    assert!(matches!(
        RomImage::open(&storage),
        Err(RomFsError::InvalidImage(_))
    ));
}

#[test]
fn test_read_rejects_file_range_outside_data() {
    let mut builder = RomFsBuilder::new();
    builder.add_file("/f", b"data".to_vec()).unwrap();
    let storage = MemoryStorage::new(builder.layout().total_size as usize);
    let header = builder.build_into(&storage).unwrap();

    let image = RomImage::open(&storage).unwrap();
    let id = image.table().convert_path_to_file_id(b"/f").unwrap();
    // key (4) + next (4) + offset (8) precede the size field
    let size_at = header.file_meta_table_offset + u64::from(id) + 16;
    storage.write(size_at, &i64::MAX.to_le_bytes()).unwrap();

    assert_eq!(image.table().open_file(b"/f").unwrap().size, i64::MAX);
    assert!(matches!(image.read_file(b"/f"), Err(RomFsError::Corrupted(_))));
    assert!(matches!(
        image.read_file_info(&RomFileInfo::new(i64::MAX, 1)),
        Err(RomFsError::Corrupted(_))
    ));
    assert!(matches!(
        image.read_file_info(&RomFileInfo::new(0, 4096)),
        Err(RomFsError::Corrupted(_))
    ));
}
