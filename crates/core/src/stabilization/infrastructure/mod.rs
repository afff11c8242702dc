pub mod translation_warper;
