// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::marker::PhantomData;

use diesel::{
    pg::Pg,
    query_builder::{AstPass, QueryFragment, QueryId},
    serialize::ToSql,
    sql_types::{HasSqlType, Untyped},
    QueryResult,
};

/// Raw SQL assembled from snippets, binds and static identifiers.
///
/// Binds are written inline and rendered as `$n` placeholders in order. Identifiers are only
/// accepted as `&'static str`, so table and column names come from compile-time mappings and
/// never from user input. Load rows with `diesel::QueryableByName` targets.
pub struct Query<'f> {
    parts: Vec<Part<'f>>,
}

enum Part<'f> {
    Sql(String),
    Ident(&'static str),
    Bind(Box<dyn QueryFragment<Pg> + Send + 'f>),
}

struct Bind<ST, U> {
    value: U,
    _data: PhantomData<ST>,
}

impl<'f> Query<'f> {
    pub fn new(sql: impl AsRef<str>) -> Self {
        Self {
            parts: vec![Part::Sql(sql.as_ref().to_owned())],
        }
    }

    pub fn sql(mut self, sql: impl AsRef<str>) -> Self {
        self.parts.push(Part::Sql(sql.as_ref().to_owned()));
        self
    }

    /// Append a quoted identifier (table or column name).
    pub fn ident(mut self, ident: &'static str) -> Self {
        self.parts.push(Part::Ident(ident));
        self
    }

    /// Embed `value` as a bind parameter at the end of the query.
    pub fn bind<ST, V>(mut self, value: V) -> Self
    where
        Pg: HasSqlType<ST>,
        V: ToSql<ST, Pg> + Send + 'f,
        ST: Send + 'f,
    {
        self.parts.push(Part::Bind(Box::new(Bind {
            value,
            _data: PhantomData,
        })));

        self
    }
}

impl QueryFragment<Pg> for Query<'_> {
    fn walk_ast<'b>(&'b self, mut out: AstPass<'_, 'b, Pg>) -> QueryResult<()> {
        for part in &self.parts {
            match part {
                Part::Sql(sql) => out.push_sql(sql),
                Part::Ident(ident) => out.push_identifier(ident)?,
                Part::Bind(bind) => bind.walk_ast(out.reborrow())?,
            }
        }

        Ok(())
    }
}

impl<ST, U> QueryFragment<Pg> for Bind<ST, U>
where
    Pg: HasSqlType<ST>,
    U: ToSql<ST, Pg>,
{
    fn walk_ast<'b>(&'b self, mut out: AstPass<'_, 'b, Pg>) -> QueryResult<()> {
        out.push_bind_param(&self.value)
    }
}

impl QueryId for Query<'_> {
    type QueryId = ();
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl diesel::query_builder::Query for Query<'_> {
    type SqlType = Untyped;
}
