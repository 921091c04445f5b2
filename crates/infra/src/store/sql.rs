//! SQL text for the legacy tables.
//!
//! Table names come from [`TableNames`]; column names are the ERP's own.

use sqlx::{Postgres, QueryBuilder};

use erplink_pricing::DiscountQuery;

use crate::config::TableNames;

pub const CUSTOMER_COLUMNS: &str = "c.CustomerNo, c.Name, c.PriceListNo, c.DiscountGrpCustNo, c.ChainNo, \
     c.TypeOfChain, c.InActiveYesNo, c.Address1, c.Address2, c.PostCode, c.PostOffice, c.LastUpdate, \
     c.InvoiceAdressNo, ia.Name AS InvoiceName, ia.Address1 AS InvoiceAddress1, \
     ia.Address2 AS InvoiceAddress2, ia.PostCode AS InvoicePostCode, ia.PostOffice AS InvoicePostOffice";

pub const AGREEMENT_COLUMNS: &str = "CustomerNo, PriceListNo, DiscountGrpCustNo, ArticleNo, DiscountGrpArtNo, \
     FromDate, ToDate, Price, DiscountPercent";

fn customer_select(tables: &TableNames) -> String {
    format!(
        "SELECT {CUSTOMER_COLUMNS} FROM {} c LEFT JOIN {} ia ON ia.InvoiceAdressNo = c.InvoiceAdressNo",
        tables.customer, tables.customer_invoice_address
    )
}

pub fn customer_by_no(tables: &TableNames) -> String {
    format!("{} WHERE c.CustomerNo = $1", customer_select(tables))
}

/// Members of a chain, excluding a head that points at itself.
pub fn chain_members(tables: &TableNames) -> String {
    format!(
        "{} WHERE c.ChainNo = $1 AND c.CustomerNo <> $1 ORDER BY c.CustomerNo",
        customer_select(tables)
    )
}

pub fn article_by_no(tables: &TableNames) -> String {
    format!(
        "SELECT ArticleNo, Name, Price1, DiscountGrpArtNo FROM {} WHERE ArticleNo = $1",
        tables.article
    )
}

pub fn price_list_by_no(tables: &TableNames) -> String {
    format!("SELECT PriceListNo, Name FROM {} WHERE PriceListNo = $1", tables.price_list)
}

pub fn discount_group_by_no(tables: &TableNames) -> String {
    format!(
        "SELECT DiscountGrpCustNo, Name FROM {} WHERE DiscountGrpCustNo = $1",
        tables.discount_group
    )
}

pub fn customers_with_agreements(tables: &TableNames) -> String {
    format!(
        "SELECT DISTINCT CustomerNo FROM {} WHERE CustomerNo <> 0 ORDER BY CustomerNo",
        tables.discount_agreement
    )
}

pub fn order_by_no(tables: &TableNames) -> String {
    format!(
        "SELECT OrderNo, CustomerNo, ChainNo, OrderStatus, OurRef, LastUpdate FROM {} WHERE OrderNo = $1",
        tables.customer_order
    )
}

/// Same as [`order_by_no`], holding the row until the transaction ends.
pub fn lock_order(tables: &TableNames) -> String {
    format!("SELECT OrderNo FROM {} WHERE OrderNo = $1 FOR UPDATE", tables.customer_order)
}

pub fn order_lines(tables: &TableNames) -> String {
    format!(
        "SELECT SeqNo, ArticleNo, Quantity, Price FROM {} WHERE OrderNo = $1 ORDER BY SeqNo",
        tables.customer_order_line
    )
}

pub fn order_line_seq_nos(tables: &TableNames) -> String {
    format!("SELECT SeqNo FROM {} WHERE OrderNo = $1", tables.customer_order_line)
}

pub fn insert_order_line(tables: &TableNames) -> String {
    format!(
        "INSERT INTO {} (OrderNo, SeqNo, ArticleNo, Quantity, Price) VALUES ($1, $2, $3, $4, $5)",
        tables.customer_order_line
    )
}

/// Agreements matching ANY of the query's sources, valid at its date, for the
/// article or (when known) its article group.
pub fn discount_agreements<'a>(tables: &TableNames, query: &DiscountQuery) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {AGREEMENT_COLUMNS} FROM {} WHERE (",
        tables.discount_agreement
    ));

    let mut sources = builder.separated(" OR ");
    for source in query.sources.iter() {
        sources.push(format!("{} = ", source.kind().column()));
        sources.push_bind_unseparated(source.raw_id());
    }

    builder
        .push(") AND FromDate <= ")
        .push_bind(query.at_date)
        .push(" AND (ToDate IS NULL OR ToDate >= ")
        .push_bind(query.at_date)
        .push(") AND (ArticleNo = ")
        .push_bind(query.article_no.as_str().to_string());
    if let Some(group) = query.article_group {
        builder.push(" OR DiscountGrpArtNo = ").push_bind(group.get());
    }
    builder.push(")");
    builder
}
