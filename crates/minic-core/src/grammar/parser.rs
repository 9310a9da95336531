//! Recursive-descent parser for mini-C with direct symbol-table actions.
//!
//! ```text
//! program   := item*
//! item      := type ID ';' | type ID '(' (type ID)? ')' body
//! body      := '{' variable* statement* '}'
//! variable  := type ID ';'
//! statement := '{' statement* '}' | ID '=' num_exp ';'
//!            | 'if' '(' rel_exp ')' statement ('else' statement)?
//!            | 'return' num_exp ';'
//! num_exp   := exp (arop exp)*
//! exp       := literal | ID | ID '(' num_exp? ')' | '(' num_exp ')'
//! rel_exp   := num_exp relop num_exp
//! ```
//!
//! A syntax error is reported once and aborts the pass. Pending scope exits
//! are skipped on abort, so everything declared before the error stays in
//! the table. Cursor queries rely on this: they parse a truncated prefix of
//! the buffer and look at what is still in scope where the text stops.

use std::mem;

use tracing::debug;

use super::lexer::{Lexer, Token, TokenKind};
use super::ParseError;
use crate::diagnostics::DiagnosticsSink;
use crate::symtab::{SymbolTable, FUN_REG, NO_ATR};
use crate::types::{DataType, KindMask, Range, SymbolKind};

type PResult<T> = Result<T, ParseError>;

/// Index of the symbol holding an expression's value, `None` when unresolved
type Operand = Option<usize>;

const MAX_NESTING: usize = 256;

/// Parser state for one pass
pub struct Parser<'src, 'ctx> {
    lexer: Lexer<'src>,
    table: &'ctx mut SymbolTable,
    sink: &'ctx mut DiagnosticsSink,
    current: Token,
    fun_idx: Option<usize>,
    var_num: u32,
    has_return: bool,
    depth: usize,
}

impl<'src, 'ctx> Parser<'src, 'ctx> {
    /// Create a parser reading from `lexer`
    pub fn new(
        mut lexer: Lexer<'src>,
        table: &'ctx mut SymbolTable,
        sink: &'ctx mut DiagnosticsSink,
    ) -> Self {
        let current = lexer.next_token(sink);
        Self {
            lexer,
            table,
            sink,
            current,
            fun_idx: None,
            var_num: 0,
            has_return: false,
            depth: 0,
        }
    }

    /// Parse a whole translation unit
    pub fn parse_program(mut self) -> Result<(), ParseError> {
        let result = self.program();
        if let Err(ParseError::Capacity(err)) = &result {
            debug!("aborting pass: {}", err);
            self.sink
                .report_error(self.current.range, "symbol table overflow");
        }
        result
    }

    fn program(&mut self) -> PResult<()> {
        while self.current.kind != TokenKind::Eof {
            self.item()?;
        }
        if self
            .table
            .lookup_symbol("main", SymbolKind::Function)
            .is_none()
        {
            self.sink
                .report_error(self.current.range, "undefined reference to 'main'");
        }
        Ok(())
    }

    fn item(&mut self) -> PResult<()> {
        let data_type = self.expect_type()?;
        let (name, range) = self.expect_id()?;

        if self.current.kind == TokenKind::LParen {
            return self.function(name, data_type, range);
        }

        if self
            .table
            .lookup_symbol(&name, SymbolKind::Variable | SymbolKind::Function)
            .is_some()
        {
            self.sink
                .report_error(range, format!("redefinition of '{name}'"));
        } else {
            self.table.insert_symbol(
                name,
                SymbolKind::Variable,
                data_type,
                NO_ATR,
                NO_ATR,
                Some(range),
            )?;
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn function(&mut self, name: String, data_type: DataType, range: Range) -> PResult<()> {
        let existing = self
            .table
            .lookup_symbol(&name, SymbolKind::Function | SymbolKind::Variable);
        if let Some(existing) = existing {
            let message = if self.table.kind(existing) == SymbolKind::Function {
                format!("redefinition of function '{name}'")
            } else {
                format!("redefinition of '{name}'")
            };
            self.sink.report_error(range, message);
        }

        let fun_idx = self.table.insert_symbol(
            name.clone(),
            SymbolKind::Function,
            data_type,
            NO_ATR,
            NO_ATR,
            Some(range),
        )?;
        self.fun_idx = Some(fun_idx);
        self.var_num = 0;
        self.has_return = false;

        self.expect(TokenKind::LParen)?;
        if let TokenKind::Type(param_type) = self.current.kind {
            self.advance();
            let (param, param_range) = self.expect_id()?;
            self.table.insert_symbol(
                param,
                SymbolKind::Parameter,
                param_type,
                1,
                NO_ATR,
                Some(param_range),
            )?;
            self.table.set_atr1(fun_idx, 1);
            self.table.set_atr2(fun_idx, param_type.as_attr());
        } else {
            self.table.set_atr1(fun_idx, 0);
        }
        self.expect(TokenKind::RParen)?;

        self.body()?;

        if !self.has_return {
            self.sink.report_warning(
                range,
                format!("function '{name}' has no return statement"),
            );
        }
        self.table.clear_from(fun_idx + 1)?;
        self.fun_idx = None;
        Ok(())
    }

    fn body(&mut self) -> PResult<()> {
        self.expect(TokenKind::LBrace)?;
        while let TokenKind::Type(data_type) = self.current.kind {
            self.advance();
            self.variable(data_type)?;
        }
        while self.current.kind != TokenKind::RBrace {
            self.statement()?;
        }
        self.advance();
        Ok(())
    }

    fn variable(&mut self, data_type: DataType) -> PResult<()> {
        let (name, range) = self.expect_id()?;
        let fun_idx = self.fun_idx;
        let local = self
            .table
            .lookup_symbol(&name, KindMask::STORAGE)
            .filter(|&idx| fun_idx.map_or(true, |fun| idx > fun));
        if local.is_some() {
            self.sink
                .report_error(range, format!("redefinition of '{name}'"));
        } else {
            self.var_num += 1;
            self.table.insert_symbol(
                name,
                SymbolKind::Variable,
                data_type,
                self.var_num,
                NO_ATR,
                Some(range),
            )?;
        }
        self.expect(TokenKind::Semicolon)?;
        Ok(())
    }

    fn statement(&mut self) -> PResult<()> {
        self.enter()?;
        match self.current.kind {
            TokenKind::LBrace => {
                self.advance();
                while self.current.kind != TokenKind::RBrace {
                    self.statement()?;
                }
                self.advance();
            }
            TokenKind::Id(_) => self.assignment()?,
            TokenKind::If => self.if_statement()?,
            TokenKind::Return => self.return_statement()?,
            _ => return Err(self.syntax_error()),
        }
        self.depth -= 1;
        Ok(())
    }

    fn assignment(&mut self) -> PResult<()> {
        let (name, range) = self.expect_id()?;
        self.expect(TokenKind::Assign)?;
        let value = self.num_exp()?;
        self.expect(TokenKind::Semicolon)?;

        match self.table.lookup_symbol(&name, KindMask::STORAGE) {
            None => self
                .sink
                .report_error(range, format!("invalid lvalue '{name}' in assignment")),
            Some(target) => {
                if mismatched(self.table.data_type(target), self.type_of(value)) {
                    self.sink
                        .report_error(range, "incompatible types in assignment");
                }
            }
        }
        Ok(())
    }

    fn if_statement(&mut self) -> PResult<()> {
        self.advance();
        self.expect(TokenKind::LParen)?;
        self.rel_exp()?;
        self.expect(TokenKind::RParen)?;
        self.statement()?;
        if self.current.kind == TokenKind::Else {
            self.advance();
            self.statement()?;
        }
        Ok(())
    }

    fn return_statement(&mut self) -> PResult<()> {
        let range = self.advance().range;
        let value = self.num_exp()?;
        self.expect(TokenKind::Semicolon)?;
        self.has_return = true;

        if let Some(fun_idx) = self.fun_idx {
            if mismatched(self.table.data_type(fun_idx), self.type_of(value)) {
                self.sink.report_error(range, "incompatible types in return");
            }
        }
        Ok(())
    }

    fn num_exp(&mut self) -> PResult<Operand> {
        let left = self.exp()?;
        while let TokenKind::Arop(_) = self.current.kind {
            let op_range = self.advance().range;
            let right = self.exp()?;
            if mismatched(self.type_of(left), self.type_of(right)) {
                self.sink
                    .report_error(op_range, "invalid operands: arithmetic operation");
            }
        }
        Ok(left)
    }

    fn rel_exp(&mut self) -> PResult<()> {
        let left = self.num_exp()?;
        if !matches!(self.current.kind, TokenKind::Relop(_)) {
            return Err(self.syntax_error());
        }
        let op_range = self.advance().range;
        let right = self.num_exp()?;
        if mismatched(self.type_of(left), self.type_of(right)) {
            self.sink
                .report_error(op_range, "invalid operands: relational operator");
        }
        Ok(())
    }

    fn exp(&mut self) -> PResult<Operand> {
        let token = match self.current.kind {
            TokenKind::IntNumber(_)
            | TokenKind::UintNumber(_)
            | TokenKind::Id(_)
            | TokenKind::LParen => self.advance(),
            _ => return Err(self.syntax_error()),
        };

        match token.kind {
            TokenKind::IntNumber(text) => {
                let index = self
                    .table
                    .insert_literal(&text, DataType::Int, token.range, self.sink)?;
                Ok(Some(index))
            }
            TokenKind::UintNumber(text) => {
                let index = self.table.insert_literal(
                    &text,
                    DataType::UnsignedInt,
                    token.range,
                    self.sink,
                )?;
                Ok(Some(index))
            }
            TokenKind::Id(name) => {
                if self.current.kind == TokenKind::LParen {
                    return self.call(&name, token.range);
                }
                let index = self.table.lookup_symbol(&name, KindMask::STORAGE);
                if index.is_none() {
                    self.sink
                        .report_error(token.range, format!("'{name}' undeclared"));
                }
                Ok(index)
            }
            _ => {
                self.enter()?;
                let value = self.num_exp()?;
                self.expect(TokenKind::RParen)?;
                self.depth -= 1;
                Ok(value)
            }
        }
    }

    fn call(&mut self, name: &str, range: Range) -> PResult<Operand> {
        let callee = self.table.lookup_symbol(name, SymbolKind::Function);
        if callee.is_none() {
            self.sink
                .report_error(range, format!("'{name}' is not a function"));
        }

        self.expect(TokenKind::LParen)?;
        let argument = if self.current.kind == TokenKind::RParen {
            None
        } else {
            Some(self.num_exp()?)
        };
        self.expect(TokenKind::RParen)?;

        let Some(callee) = callee else {
            return Ok(None);
        };
        let arg_count = u32::from(argument.is_some());
        if self.table.atr1(callee) != arg_count {
            self.sink.report_error(
                range,
                format!("wrong number of arguments to function '{name}'"),
            );
        } else if let Some(argument) = argument {
            let param_type = DataType::from_attr(self.table.atr2(callee));
            if mismatched(param_type, self.type_of(argument)) {
                self.sink
                    .report_error(range, format!("incompatible type for argument in '{name}'"));
            }
        }

        self.table.set_type(FUN_REG, self.table.data_type(callee));
        Ok(Some(FUN_REG))
    }

    fn type_of(&self, operand: Operand) -> DataType {
        operand.map_or(DataType::None, |index| self.table.data_type(index))
    }

    fn advance(&mut self) -> Token {
        let next = self.lexer.next_token(self.sink);
        mem::replace(&mut self.current, next)
    }

    fn expect(&mut self, expected: TokenKind) -> PResult<Token> {
        if mem::discriminant(&self.current.kind) == mem::discriminant(&expected) {
            Ok(self.advance())
        } else {
            Err(self.syntax_error())
        }
    }

    fn expect_type(&mut self) -> PResult<DataType> {
        let TokenKind::Type(data_type) = self.current.kind else {
            return Err(self.syntax_error());
        };
        self.advance();
        Ok(data_type)
    }

    fn expect_id(&mut self) -> PResult<(String, Range)> {
        let TokenKind::Id(name) = &self.current.kind else {
            return Err(self.syntax_error());
        };
        let name = name.clone();
        let range = self.advance().range;
        Ok((name, range))
    }

    fn enter(&mut self) -> PResult<()> {
        if self.depth >= MAX_NESTING {
            self.sink.report_error(self.current.range, "nesting too deep");
            return Err(ParseError::Syntax {
                position: self.current.range.start,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn syntax_error(&mut self) -> ParseError {
        self.sink.report_error(
            self.current.range,
            format!("syntax error, unexpected {}", self.current.kind),
        );
        ParseError::Syntax {
            position: self.current.range.start,
        }
    }
}

/// Two resolved types that disagree. Unresolved operands were already
/// reported where they appeared and do not cascade.
fn mismatched(left: DataType, right: DataType) -> bool {
    left != DataType::None && right != DataType::None && left != right
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::DiagnosticSeverity;
    use crate::grammar::{Grammar, MiniC};
    use crate::symtab::REGISTER_COUNT;
    use crate::types::Position;

    fn parse(source: &str) -> (SymbolTable, DiagnosticsSink, Result<(), ParseError>) {
        let mut table = SymbolTable::new();
        let mut sink = DiagnosticsSink::collecting();
        let result = MiniC.parse(source, &mut table, &mut sink);
        (table, sink, result)
    }

    fn messages(sink: &DiagnosticsSink) -> Vec<&str> {
        sink.diagnostics()
            .iter()
            .map(|d| d.message.as_str())
            .collect()
    }

    #[test]
    fn test_clean_program_has_no_diagnostics() {
        let (table, sink, result) = parse(
            "int g;\n\
             unsigned f(unsigned p) {\n  unsigned a;\n  a = p + 2u;\n  return a;\n}\n\
             int main() {\n  int x;\n  x = 3;\n  if (x < 4) x = g; else { x = 1; }\n  return x;\n}\n",
        );
        assert!(result.is_ok());
        assert!(sink.is_empty(), "{:?}", messages(&sink));
        // Locals are gone once their function closes
        assert!(table.lookup_symbol("a", KindMask::NAMED).is_none());
        assert!(table.lookup_symbol("p", KindMask::NAMED).is_none());
        assert!(table.lookup_symbol("f", SymbolKind::Function).is_some());
    }

    #[test]
    fn test_global_redefinition() {
        let (_, sink, _) = parse("int x; int x;");
        assert_eq!(
            messages(&sink),
            vec!["redefinition of 'x'", "undefined reference to 'main'"]
        );
    }

    #[test]
    fn test_local_may_shadow_global() {
        let (_, sink, _) = parse("int x;\nint main() { unsigned x; x = 1u; return 0; }");
        assert!(sink.is_empty(), "{:?}", messages(&sink));
    }

    #[test]
    fn test_local_redefinition() {
        let (_, sink, _) = parse("int main(int p) { int a; int a; int p; return 0; }");
        assert_eq!(
            messages(&sink),
            vec!["redefinition of 'a'", "redefinition of 'p'"]
        );
    }

    #[test]
    fn test_semantic_errors() {
        let (_, sink, result) = parse(
            "int f(int a) { return a; }\n\
             int main() {\n\
               int x;\n\
               unsigned u;\n\
               y = 1;\n\
               x = u;\n\
               x = z;\n\
               x = f();\n\
               x = f(u);\n\
               x = g(1);\n\
               x = x + u;\n\
               if (x == u) x = 1;\n\
               return u;\n\
             }",
        );
        assert!(result.is_ok());
        assert_eq!(
            messages(&sink),
            vec![
                "invalid lvalue 'y' in assignment",
                "incompatible types in assignment",
                "'z' undeclared",
                "wrong number of arguments to function 'f'",
                "incompatible type for argument in 'f'",
                "'g' is not a function",
                "invalid operands: arithmetic operation",
                "invalid operands: relational operator",
                "incompatible types in return",
            ]
        );
    }

    #[test]
    fn test_missing_return_is_a_warning() {
        let (_, sink, _) = parse("int main() { int x; x = 1; }");
        assert_eq!(sink.len(), 1);
        let diag = &sink.diagnostics()[0];
        assert_eq!(diag.severity, DiagnosticSeverity::Warning);
        assert_eq!(diag.message, "function 'main' has no return statement");
        assert_eq!(diag.range.start, Position::new(0, 4));
    }

    #[test]
    fn test_function_redefinition() {
        let (_, sink, _) = parse("int main() { return 0; }\nint main() { return 1; }");
        assert_eq!(messages(&sink), vec!["redefinition of function 'main'"]);
    }

    #[test]
    fn test_syntax_error_keeps_open_scope() {
        let (table, sink, result) = parse("int main() {\n  int x;\n  return x");
        assert!(matches!(result, Err(ParseError::Syntax { .. })));
        assert_eq!(
            messages(&sink),
            vec!["syntax error, unexpected end of file"]
        );
        let x = table.lookup_symbol("x", KindMask::NAMED).unwrap();
        assert_eq!(table.display(x), "int x");
        assert!(table.lookup_symbol("main", SymbolKind::Function).is_some());
    }

    #[test]
    fn test_unterminated_global_is_a_variable() {
        let (table, _, result) = parse("int counter");
        assert!(matches!(result, Err(ParseError::Syntax { .. })));
        let counter = table.lookup_symbol("counter", KindMask::NAMED).unwrap();
        assert_eq!(table.kind(counter), SymbolKind::Variable);
        assert!(table.lookup_symbol("counter", SymbolKind::Function).is_none());
    }

    #[test]
    fn test_syntax_error_position() {
        let (_, sink, result) = parse("int main() {\n  return 1 +;\n}");
        assert_eq!(
            result,
            Err(ParseError::Syntax {
                position: Position::new(1, 12)
            })
        );
        assert_eq!(messages(&sink), vec!["syntax error, unexpected ';'"]);
    }

    #[test]
    fn test_out_of_range_literal_in_program() {
        let (_, sink, _) = parse("int main() { return 99999999999; }");
        assert_eq!(messages(&sink), vec!["literal out of range"]);
    }

    #[test]
    fn test_function_attributes() {
        let (table, _, _) = parse("unsigned f(int a) {\n  return 1u;\n}\nint main() { return 0; }");
        let f = table.lookup_symbol("f", SymbolKind::Function).unwrap();
        assert_eq!(table.atr1(f), 1);
        assert_eq!(DataType::from_attr(table.atr2(f)), DataType::Int);
        assert_eq!(table.display(f), "unsigned f(int)");
        let main = table.lookup_symbol("main", SymbolKind::Function).unwrap();
        assert_eq!(table.display(main), "int main");
    }

    #[test]
    fn test_call_result_lands_in_function_register() {
        let (table, sink, _) =
            parse("unsigned f() { return 1u; }\nint main() { unsigned u; u = f(); return 0; }");
        assert!(sink.is_empty(), "{:?}", messages(&sink));
        assert_eq!(table.data_type(FUN_REG), DataType::UnsignedInt);
    }

    #[test]
    fn test_overflow_aborts_pass_with_diagnostic() {
        let mut table = SymbolTable::with_capacity(REGISTER_COUNT + 2);
        let mut sink = DiagnosticsSink::collecting();
        let result = MiniC.parse("int a; int b; int c;", &mut table, &mut sink);
        assert!(matches!(result, Err(ParseError::Capacity(_))));
        assert_eq!(messages(&sink), vec!["symbol table overflow"]);
        assert_eq!(table.len(), REGISTER_COUNT + 2);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!(
            "int main() {{ return {}1{}; }}",
            "(".repeat(MAX_NESTING + 1),
            ")".repeat(MAX_NESTING + 1)
        );
        let (_, sink, result) = parse(&source);
        assert!(result.is_err());
        assert_eq!(messages(&sink), vec!["nesting too deep"]);
    }
}
