//! End-to-end scenario and invariant tests, driving the filesystem purely
//! through `FileSystem`'s public operations, each on its own `tempfile`
//! backing file.

use fsengine::FileSystem;
use tempfile::NamedTempFile;

const BLOCK_SIZE: u64 = 4096;
const DISK_BLOCKS: u64 = 50;
const INODES: u64 = 20;

fn fresh_fs() -> FileSystem {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();
    // The backing file must not already exist for a fresh mkfs.
    std::fs::remove_file(&path).unwrap();
    FileSystem::mkfs(&path, BLOCK_SIZE, DISK_BLOCKS, INODES, false).unwrap()
}

#[test]
fn scenario_1_format_then_ls_on_root() {
    let fs = fresh_fs();
    assert_eq!(fs.ls().unwrap(), "0 .\n0 ..");
}

#[test]
fn scenario_2_mkdir_then_ls_then_stat() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    assert_eq!(fs.ls().unwrap(), "0 .\n0 ..\n1 a");
    let stat = fs.stat("/a").unwrap();
    assert!(stat.contains("links_cnt: 2"));
    assert!(stat.contains("file_type: d"));
}

#[test]
fn scenario_3_create_open_write_seek_read() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    let fd = fs.open("/f").unwrap();
    fs.write(fd, b"hello", 5).unwrap();
    fs.seek(fd, 0).unwrap();
    assert_eq!(fs.read(fd, 5).unwrap(), b"hello".to_vec());
}

#[test]
fn scenario_4_link_unlink_tracks_link_count() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    fs.link("/f", "/g").unwrap();
    assert!(fs.stat("/g").unwrap().contains("links_cnt: 2"));
    fs.unlink("/f").unwrap();
    assert!(fs.stat("/g").unwrap().contains("links_cnt: 1"));
}

#[test]
fn scenario_5_symlink_cd_ls_and_terminal_stat() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.symlink("/a", "/s").unwrap();
    fs.cd("/s").unwrap();
    // cwd is now inside /a (transparently followed), listing /a's own entries.
    assert_eq!(fs.ls().unwrap(), "1 .\n0 ..");
    assert!(fs.stat("/s").unwrap().contains("file_type: l"));
}

#[test]
fn scenario_6_rmdir_refuses_nonempty_and_root() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.create("/a/f").unwrap();
    assert!(fs.rmdir("/a").is_err());
    assert!(fs.rmdir("/").is_err());
}

#[test]
fn write_then_seek_zero_then_read_returns_a_prefix() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    let fd = fs.open("/f").unwrap();
    fs.write(fd, b"hello world", 11).unwrap();
    fs.seek(fd, 0).unwrap();
    let prefix = fs.read(fd, 5).unwrap();
    assert_eq!(prefix, b"hello".to_vec());
}

#[test]
fn unlinking_the_last_name_frees_the_inode_and_blocks() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    let fd = fs.open("/f").unwrap();
    fs.write(fd, b"hello", 5).unwrap();
    fs.close(fd).unwrap();
    fs.unlink("/f").unwrap();
    // The name no longer resolves, and re-creating reuses the freed slot/blocks.
    assert!(fs.open("/f").is_err());
    fs.create("/f").unwrap();
    let stat = fs.stat("/f").unwrap();
    assert!(stat.contains("file_size: 0"));
}

#[test]
fn mkdir_then_rmdir_frees_the_inode_for_reuse() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    let before = fs.stat("/a").unwrap();
    assert!(before.contains("id: 1"));
    fs.rmdir("/a").unwrap();
    fs.mkdir("/b").unwrap();
    let after = fs.stat("/b").unwrap();
    assert!(after.contains("id: 1"));
}

#[test]
fn nested_directories_hold_correct_dot_and_dotdot() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.mkdir("/a/b").unwrap();
    fs.cd("/a/b").unwrap();
    assert_eq!(fs.cwd(), "/a/b");
    // "." refers to b itself (id 2), ".." refers to a (id 1).
    assert_eq!(fs.ls().unwrap(), "2 .\n1 ..");
}

#[test]
fn too_many_open_files_is_rejected() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    let mut opened = Vec::new();
    for _ in 0..10000 {
        opened.push(fs.open("/f").unwrap());
    }
    assert!(fs.open("/f").is_err());
}

#[test]
fn wrong_descriptor_number_is_rejected() {
    let mut fs = fresh_fs();
    assert!(fs.close(999).is_err());
    assert!(fs.seek(999, 0).is_err());
    assert!(fs.read(999, 1).is_err());
}

#[test]
fn duplicate_name_in_a_directory_is_rejected() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    assert!(fs.create("/f").is_err());
    fs.mkdir("/a").unwrap();
    assert!(fs.mkdir("/a").is_err());
}

#[test]
fn linking_or_unlinking_a_directory_is_rejected() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    assert!(fs.link("/a", "/b").is_err());
    assert!(fs.unlink("/a").is_err());
}

#[test]
fn unlinking_an_open_file_is_rejected() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    let _fd = fs.open("/f").unwrap();
    assert!(fs.unlink("/f").is_err());
}

#[test]
fn symlink_loop_fails_instead_of_hanging() {
    let mut fs = fresh_fs();
    fs.symlink("/b", "/a").unwrap();
    fs.symlink("/a", "/b").unwrap();
    assert!(fs.open("/a").is_err());
}

#[test]
fn dotdot_at_root_stays_at_root() {
    let mut fs = fresh_fs();
    fs.mkdir("/a").unwrap();
    fs.cd("/a").unwrap();
    fs.cd("..").unwrap();
    assert_eq!(fs.cwd(), "/");
}

#[test]
fn unlinking_a_symlink_name_does_not_touch_its_target() {
    let mut fs = fresh_fs();
    fs.create("/f").unwrap();
    fs.symlink("/f", "/s").unwrap();

    fs.unlink("/s").unwrap();

    assert!(fs.stat("/s").is_err());
    assert!(fs.stat("/f").unwrap().contains("links_cnt: 1"));
}

#[test]
fn cd_into_a_missing_path_is_not_validated_eagerly() {
    let mut fs = fresh_fs();
    fs.cd("/nope").unwrap();
    assert_eq!(fs.cwd(), "/nope");
    assert!(fs.ls().is_err());
}
