//! Реестр занятых имён

use std::collections::BTreeSet;

/// Множество занятых имён объектов.
///
/// Сам реестр не содержит блокировки: его единственная область взаимного
/// исключения - блокировка [`ObjectCatalog`](super::ObjectCatalog), общая с
/// хранилищем матриц. Так проверка и резервирование имени не могут
/// перемежаться с изменениями хранилища.
#[derive(Debug, Default)]
pub struct NameRegistry {
    names: BTreeSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Занимает имя. `false`, если оно уже занято; состояние при этом не меняется.
    pub fn reserve(&mut self, name: &str) -> bool {
        if self.names.contains(name) {
            return false;
        }
        self.names.insert(name.to_owned())
    }

    /// Освобождает имя, возвращает, было ли оно занято
    pub fn release(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Снимок всех занятых имён, в лексикографическом порядке
    pub fn list(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_is_exclusive() {
        let mut registry = NameRegistry::new();
        assert!(registry.reserve("a"));
        assert!(!registry.reserve("a"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn release_reports_presence() {
        let mut registry = NameRegistry::new();
        assert!(!registry.release("a"));
        registry.reserve("a");
        assert!(registry.release("a"));
        assert!(!registry.contains("a"));
        assert!(registry.reserve("a"));
    }

    #[test]
    fn list_is_sorted_snapshot() {
        let mut registry = NameRegistry::new();
        for name in ["c", "a", "b"] {
            registry.reserve(name);
        }
        assert_eq!(registry.list(), vec!["a", "b", "c"]);
    }
}
