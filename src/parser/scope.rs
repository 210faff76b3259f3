use crate::parser::ast::NodeId;
use crate::parser::types::Type;
use std::collections::HashMap;

/// unique id for each scope opened while parsing, id = 0 is always the file scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone)]
pub enum Symbol {
    Variable { decl: NodeId, ty: Type },
    Function { decl: NodeId, ty: Type },
    EnumConstant { decl: NodeId, ty: Type },
    Typedef { ty: Type },
}

#[derive(Debug, Clone)]
struct Scope {
    parent: Option<ScopeId>,
    symbols: HashMap<String, Symbol>,
    /// enum tags live in their own namespace
    tags: HashMap<String, Type>,
}

/// Ordinary identifiers and enum tags of one translation unit, by lexical scope
#[derive(Debug, Clone)]
pub struct SymbolTable {
    scopes: HashMap<ScopeId, Scope>,
    next_scope_id: usize,
    global_scope_id: ScopeId,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut table = Self {
            scopes: HashMap::new(),
            next_scope_id: 0,
            global_scope_id: ScopeId(0),
        };

        table.create_scope(None); // file scope
        table
    }

    pub fn global_scope(&self) -> ScopeId {
        self.global_scope_id
    }

    pub fn create_scope(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.next_scope_id);
        self.next_scope_id += 1;

        let scope = Scope {
            parent,
            symbols: HashMap::new(),
            tags: HashMap::new(),
        };

        self.scopes.insert(id, scope);
        id
    }

    /// Functions may be redeclared, and a typedef may repeat with the same type
    pub fn add_symbol(&mut self, scope_id: ScopeId, name: &str, symbol: Symbol) -> Result<(), String> {
        let Some(scope) = self.scopes.get_mut(&scope_id) else {
            return Err(format!("Scope '{:?}' not found", scope_id));
        };

        if let Some(existing) = scope.symbols.get(name) {
            let compatible = match (existing, &symbol) {
                (Symbol::Function { .. }, Symbol::Function { .. }) => true,
                (Symbol::Typedef { ty: old }, Symbol::Typedef { ty: new }) => old == new,
                _ => false,
            };
            if !compatible {
                return Err(format!("redefinition of '{}'", name));
            }
        }

        scope.symbols.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn lookup_symbol(&self, scope_id: ScopeId, name: &str) -> Option<&Symbol> {
        let mut current = Some(scope_id);

        while let Some(id) = current {
            let scope = self.scopes.get(&id)?;
            if let Some(symbol) = scope.symbols.get(name) {
                return Some(symbol);
            }
            current = scope.parent;
        }

        None
    }

    pub fn add_tag(&mut self, scope_id: ScopeId, name: &str, ty: Type) -> Result<(), String> {
        let Some(scope) = self.scopes.get_mut(&scope_id) else {
            return Err(format!("Scope '{:?}' not found", scope_id));
        };
        if scope.tags.contains_key(name) {
            return Err(format!("redefinition of 'enum {}'", name));
        }
        scope.tags.insert(name.to_string(), ty);
        Ok(())
    }

    pub fn lookup_tag(&self, scope_id: ScopeId, name: &str) -> Option<&Type> {
        let mut current = Some(scope_id);

        while let Some(id) = current {
            let scope = self.scopes.get(&id)?;
            if let Some(ty) = scope.tags.get(name) {
                return Some(ty);
            }
            current = scope.parent;
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variable() -> Symbol {
        Symbol::Variable {
            decl: NodeId::default(),
            ty: Type::INT,
        }
    }

    #[test]
    fn inner_scopes_see_outer_symbols() {
        let mut table = SymbolTable::new();
        let global = table.global_scope();
        table.add_symbol(global, "x", variable()).unwrap();
        let inner = table.create_scope(Some(global));
        assert!(table.lookup_symbol(inner, "x").is_some());

        table.add_symbol(inner, "y", variable()).unwrap();
        assert!(table.lookup_symbol(global, "y").is_none());
    }

    #[test]
    fn redefinition_rules() {
        let mut table = SymbolTable::new();
        let global = table.global_scope();
        table.add_symbol(global, "x", variable()).unwrap();
        assert!(table.add_symbol(global, "x", variable()).is_err());

        let typedef = || Symbol::Typedef { ty: Type::INT };
        table.add_symbol(global, "T", typedef()).unwrap();
        assert!(table.add_symbol(global, "T", typedef()).is_ok());

        let function = || Symbol::Function {
            decl: NodeId::default(),
            ty: Type::Void,
        };
        table.add_symbol(global, "f", function()).unwrap();
        assert!(table.add_symbol(global, "f", function()).is_ok());
    }

    #[test]
    fn tags_are_a_separate_namespace() {
        let mut table = SymbolTable::new();
        let global = table.global_scope();
        table.add_symbol(global, "Color", variable()).unwrap();
        table
            .add_tag(global, "Color", Type::Enum("Color".into()))
            .unwrap();
        assert_eq!(
            table.lookup_tag(global, "Color"),
            Some(&Type::Enum("Color".into()))
        );
        assert!(table.add_tag(global, "Color", Type::Enum("Color".into())).is_err());
    }
}
