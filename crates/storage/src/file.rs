use {
    iavl_types::{Order, Record, Storage},
    std::{collections::BTreeMap, fs, io, path::{Path, PathBuf}},
};

/// A `BTreeMap`-backed `Storage` that loads its whole contents from a single
/// file at `open` and writes them back out on `save`. The CLI's default
/// persistent backend, standing in for a production embedded KV engine.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl FileStorage {
    /// Loads `path`'s contents if it exists, otherwise starts empty.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(bytes) if !bytes.is_empty() => {
                rmp_serde::from_slice(&bytes).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
            },
            Ok(_) | Err(_) => BTreeMap::new(),
        };
        Ok(Self { path, data })
    }

    /// Writes the full contents back to `path`, replacing it atomically via
    /// a same-directory temp file.
    pub fn save(&self) -> io::Result<()> {
        let bytes = rmp_serde::to_vec(&self.data).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        let tmp_path = tmp_path(&self.path);
        fs::write(&tmp_path, bytes)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

impl Storage for FileStorage {
    fn read(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.data.get(key).cloned()
    }

    fn scan<'a>(
        &'a self,
        min: Option<&[u8]>,
        max: Option<&[u8]>,
        order: Order,
    ) -> Box<dyn Iterator<Item = Record> + 'a> {
        use std::ops::Bound;

        let min = min.map_or(Bound::Unbounded, |b| Bound::Included(b.to_vec()));
        let max = max.map_or(Bound::Unbounded, |b| Bound::Excluded(b.to_vec()));
        let range = self.data.range((min, max)).map(|(k, v)| (k.clone(), v.clone()));

        match order {
            Order::Ascending => Box::new(range.collect::<Vec<_>>().into_iter()),
            Order::Descending => {
                let mut items: Vec<_> = range.collect();
                items.reverse();
                Box::new(items.into_iter())
            },
        }
    }

    fn write(&mut self, key: &[u8], value: &[u8]) {
        self.data.insert(key.to_vec(), value.to_vec());
    }

    fn remove(&mut self, key: &[u8]) {
        self.data.remove(key);
    }
}
