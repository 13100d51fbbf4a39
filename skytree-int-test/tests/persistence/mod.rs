mod persistence_test;
