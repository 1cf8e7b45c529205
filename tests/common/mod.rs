//! Shared fixtures: an in-memory file-object provider and a capturing
//! console, wired into a freshly bootstrapped kernel.

use std::sync::Arc;

use hashbrown::HashMap;
use spin::Mutex;

use tidepool_core::fs::{Console, FileObject, OpenFlags, Vfs};
use tidepool_core::{Error, Kernel, Result};

pub struct MemFile {
    data: Mutex<Vec<u8>>,
}

impl MemFile {
    pub fn new(data: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            data: Mutex::new(data.to_vec()),
        })
    }
}

impl FileObject for MemFile {
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        let data = self.data.lock();
        let start = (offset as usize).min(data.len());
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write_at(&self, offset: u64, buf: &[u8]) -> Result<usize> {
        let mut data = self.data.lock();
        let end = offset as usize + buf.len();
        if data.len() < end {
            data.resize(end, 0);
        }
        data[offset as usize..end].copy_from_slice(buf);
        Ok(buf.len())
    }

    fn size(&self) -> u64 {
        self.data.lock().len() as u64
    }
}

pub struct MemVfs {
    files: Mutex<HashMap<String, Arc<MemFile>>>,
}

impl MemVfs {
    pub fn new(files: &[(&str, &[u8])]) -> Self {
        let mut map = HashMap::new();
        for (path, data) in files {
            map.insert(path.to_string(), MemFile::new(data));
        }
        Self {
            files: Mutex::new(map),
        }
    }
}

impl Vfs for MemVfs {
    fn open(&self, path: &str, flags: OpenFlags, _mode: u32) -> Result<Arc<dyn FileObject>> {
        let mut files = self.files.lock();
        if let Some(file) = files.get(path) {
            if flags.contains(OpenFlags::TRUNC) {
                file.data.lock().clear();
            }
            return Ok(file.clone());
        }
        if flags.contains(OpenFlags::CREAT) {
            let file = MemFile::new(&[]);
            files.insert(path.to_string(), file.clone());
            return Ok(file);
        }
        Err(Error::InvalidPath)
    }
}

/// Console that replays a scripted input and captures all output.
pub struct TestConsole {
    input: Mutex<Vec<u8>>,
    output: Mutex<Vec<u8>>,
}

impl TestConsole {
    pub fn new(input: &[u8]) -> Arc<Self> {
        Arc::new(Self {
            input: Mutex::new(input.to_vec()),
            output: Mutex::new(Vec::new()),
        })
    }

    pub fn output(&self) -> Vec<u8> {
        self.output.lock().clone()
    }
}

impl Console for TestConsole {
    fn read(&self, buf: &mut [u8]) -> usize {
        let mut input = self.input.lock();
        let n = buf.len().min(input.len());
        buf[..n].copy_from_slice(&input[..n]);
        input.drain(..n);
        n
    }

    fn write(&self, buf: &[u8]) -> usize {
        self.output.lock().extend_from_slice(buf);
        buf.len()
    }
}

pub fn boot(files: &[(&str, &[u8])]) -> (Kernel, Arc<TestConsole>) {
    let console = TestConsole::new(&[]);
    let kernel = Kernel::new(Arc::new(MemVfs::new(files)), console.clone())
        .expect("kernel bootstrap");
    (kernel, console)
}
