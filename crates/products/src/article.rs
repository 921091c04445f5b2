use std::sync::Arc;

use serde::{Deserialize, Serialize};

use erplink_core::{ArticleGroupNo, ArticleNo, Entity, RepositoryError};

/// Read-only view of an ERP article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub article_no: ArticleNo,
    pub name: String,
    /// Base price in smallest currency unit (e.g., øre/cents).
    pub base_price: u64,
    /// Article discount group (`DiscountGrpArtNo`); agreements may target it
    /// instead of the individual article.
    pub article_group: Option<ArticleGroupNo>,
}

impl Article {
    pub fn new(article_no: ArticleNo, name: impl Into<String>, base_price: u64) -> Self {
        Self {
            article_no,
            name: name.into(),
            base_price,
            article_group: None,
        }
    }

    pub fn with_group(mut self, article_group: ArticleGroupNo) -> Self {
        self.article_group = Some(article_group);
        self
    }
}

impl Entity for Article {
    type Id = ArticleNo;

    fn id(&self) -> &Self::Id {
        &self.article_no
    }
}

/// Read access to the article table.
pub trait ArticleCatalog: Send + Sync {
    fn find_article(&self, article_no: &ArticleNo) -> Result<Option<Article>, RepositoryError>;
}

impl<S> ArticleCatalog for Arc<S>
where
    S: ArticleCatalog + ?Sized,
{
    fn find_article(&self, article_no: &ArticleNo) -> Result<Option<Article>, RepositoryError> {
        (**self).find_article(article_no)
    }
}
