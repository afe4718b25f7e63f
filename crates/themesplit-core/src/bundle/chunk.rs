use indexmap::IndexMap;
use std::fmt;

use super::graph::{ModuleGraph, ModuleId};

/// Emitted file name to content, in emission order
pub type Assets = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    pub name: String,
    /// Why the chunk exists, set for chunks created by split rules
    pub reason: Option<String>,
    pub modules: Vec<ModuleId>,
    pub files: Vec<String>,
    pub groups: Vec<GroupId>,
}

impl Chunk {
    pub fn contains_module(&self, module: ModuleId) -> bool {
        self.modules.contains(&module)
    }

    /// Remove `module`, returning the position it occupied
    pub fn remove_module(&mut self, module: ModuleId) -> Option<usize> {
        let index = self.modules.iter().position(|m| *m == module)?;
        self.modules.remove(index);
        Some(index)
    }

    /// Re-insert `module` at `index`, clamped to the current length
    pub fn insert_module(&mut self, index: usize, module: ModuleId) {
        if self.contains_module(module) {
            return;
        }
        let index = index.min(self.modules.len());
        self.modules.insert(index, module);
    }
}

/// An entrypoint: the chunks that must load for one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkGroup {
    pub id: GroupId,
    pub name: String,
    pub chunks: Vec<ChunkId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkGraph {
    pub chunks: Vec<Chunk>,
    pub groups: Vec<ChunkGroup>,
}

impl ChunkGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_chunk(&mut self, name: impl Into<String>, reason: Option<String>) -> ChunkId {
        let id = ChunkId(self.chunks.len());
        self.chunks.push(Chunk {
            id,
            name: name.into(),
            reason,
            modules: Vec::new(),
            files: Vec::new(),
            groups: Vec::new(),
        });
        id
    }

    pub fn add_group(&mut self, name: impl Into<String>) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(ChunkGroup {
            id,
            name: name.into(),
            chunks: Vec::new(),
        });
        id
    }

    pub fn connect(&mut self, group: GroupId, chunk: ChunkId) {
        let g = &mut self.groups[group.0];
        if !g.chunks.contains(&chunk) {
            g.chunks.push(chunk);
        }
        let c = &mut self.chunks[chunk.0];
        if !c.groups.contains(&group) {
            c.groups.push(group);
        }
    }

    /// Remove `chunk` from every group it belongs to
    pub fn detach_chunk(&mut self, chunk: ChunkId) {
        let groups = std::mem::take(&mut self.chunks[chunk.0].groups);
        for group in groups {
            self.groups[group.0].chunks.retain(|c| *c != chunk);
        }
    }

    pub fn chunk(&self, id: ChunkId) -> &Chunk {
        &self.chunks[id.0]
    }

    pub fn chunk_mut(&mut self, id: ChunkId) -> &mut Chunk {
        &mut self.chunks[id.0]
    }

    pub fn chunk_by_name(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    pub fn group(&self, id: GroupId) -> &ChunkGroup {
        &self.groups[id.0]
    }

    pub fn group_by_name(&self, name: &str) -> Option<&ChunkGroup> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Reason recorded on chunks created by the split rule `name`
pub fn split_chunk_reason(name: &str) -> String {
    format!("split chunk (cache group: {})", name)
}

type ModuleTest = Box<dyn Fn(ModuleId, &ModuleGraph) -> bool + Send + Sync>;

/// Moves every module matching `test` into a dedicated chunk named `name`
pub struct SplitRule {
    pub name: String,
    test: ModuleTest,
}

impl SplitRule {
    pub fn new(
        name: impl Into<String>,
        test: impl Fn(ModuleId, &ModuleGraph) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            test: Box::new(test),
        }
    }

    pub fn matches(&self, module: ModuleId, graph: &ModuleGraph) -> bool {
        (self.test)(module, graph)
    }
}

impl fmt::Debug for SplitRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitRule").field("name", &self.name).finish()
    }
}
